//! Error types for BAPcomp

use thiserror::Error;

/// Main error type for raster, image and configuration operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Band '{band}' not found (available: {available})")]
    MissingBand { band: String, available: String },

    #[error("Duplicate band name '{0}'")]
    DuplicateBand(String),

    #[error("Band layout mismatch: {0}")]
    BandLayoutMismatch(String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("'{0}' is not a maskable category (expected one of: cloud, shadow, snow, water, waterplus, nonforest)")]
    UnknownMaskCategory(String),

    #[error("The index '{0}' is not supported")]
    UnknownIndex(String),

    #[error("Unknown sensor '{0}' (expected LT05, LE07, LC08 or LC09)")]
    UnknownSensor(String),

    #[error("Invalid day-of-year '{0}': expected MM-DD")]
    InvalidMonthDay(String),

    #[error("End year {end} is before start year {start}")]
    InvalidYearRange { start: i32, end: i32 },

    #[error("Day window {start} to {end} is empty")]
    EmptyDayWindow { start: String, end: String },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error is an input-validation failure, detected before
    /// any imagery is requested.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::UnknownMaskCategory(_)
                | Error::UnknownIndex(_)
                | Error::UnknownSensor(_)
                | Error::InvalidMonthDay(_)
                | Error::InvalidYearRange { .. }
                | Error::EmptyDayWindow { .. }
                | Error::InvalidParameter { .. }
        )
    }
}

/// Result type alias for BAPcomp operations
pub type Result<T> = std::result::Result<T, Error>;
