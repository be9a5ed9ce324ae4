//! # BAPcomp Core
//!
//! Core types and I/O for best-available-pixel compositing.
//!
//! This crate provides:
//! - `Raster<T>`: Generic single-band raster grid
//! - `RasterImage` / `RasterCollection`: multi-band, timestamped, masked imagery
//! - `GeoTransform`, `CRS` and `GridSpec` for georeferencing
//! - `Sensor` profiles and calendar windows (`MonthDay`, `DayWindow`, `DateRange`)
//! - Native GeoTIFF I/O

pub mod calendar;
pub mod crs;
pub mod error;
pub mod image;
pub mod io;
pub mod raster;
pub mod sensor;

pub use calendar::{DateRange, DayWindow, MonthDay, NominalDate};
pub use crs::CRS;
pub use error::{Error, Result};
pub use image::{stack_layout, Band, RasterCollection, RasterImage, StackLayout};
pub use raster::{GeoTransform, GridSpec, Raster, RasterElement};
pub use sensor::{Sensor, SensorProfile, HARMONIZED_BANDS, QA_BAND};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::calendar::{DateRange, DayWindow, MonthDay, NominalDate};
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::image::{Band, RasterCollection, RasterImage};
    pub use crate::raster::{GeoTransform, GridSpec, Raster, RasterElement};
    pub use crate::sensor::{Sensor, HARMONIZED_BANDS};
    pub use crate::Algorithm;
}

/// Core trait for compositing and index algorithms.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
