//! Error types for imagery services.

use thiserror::Error;

/// Errors produced while querying imagery or auxiliary datasets.
#[derive(Error, Debug)]
pub enum ImageryError {
    #[error("query against {dataset} failed: {reason}")]
    Query { dataset: String, reason: String },

    #[error("dataset unavailable: {0}")]
    DatasetUnavailable(String),

    #[error("invalid catalog: {0}")]
    Catalog(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("core error: {0}")]
    Core(#[from] bapcomp_core::Error),
}

/// Result alias for imagery operations.
pub type Result<T> = std::result::Result<T, ImageryError>;
