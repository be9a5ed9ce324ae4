//! Error types for series assembly.

use thiserror::Error;

use bapcomp_core::Sensor;
use bapcomp_imagery::ImageryError;

/// Errors produced while assembling a composite series.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] bapcomp_core::Error),

    #[error("year {year}: {} query failed: {source}", query_source(.sensor))]
    Query {
        year: i32,
        /// `None` for auxiliary-layer requests
        sensor: Option<Sensor>,
        #[source]
        source: ImageryError,
    },

    #[error("year {year}: {source}")]
    Composite {
        year: i32,
        #[source]
        source: bapcomp_core::Error,
    },

    #[error("year {year} was cancelled")]
    Cancelled { year: i32 },

    #[error("year {year}: task failed: {reason}")]
    TaskFailed { year: i32, reason: String },
}

impl PipelineError {
    /// The year this failure belongs to, if it is year-specific
    pub fn year(&self) -> Option<i32> {
        match self {
            PipelineError::Core(_) => None,
            PipelineError::Query { year, .. }
            | PipelineError::Composite { year, .. }
            | PipelineError::Cancelled { year }
            | PipelineError::TaskFailed { year, .. } => Some(*year),
        }
    }

    /// Whether the failure came from rejecting the configuration
    pub fn is_validation(&self) -> bool {
        matches!(self, PipelineError::Core(e) if e.is_validation())
    }
}

fn query_source(sensor: &Option<Sensor>) -> String {
    match sensor {
        Some(s) => s.to_string(),
        None => "auxiliary".to_string(),
    }
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
