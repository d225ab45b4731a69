//! Error types for markup-tree

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while converting a markup report.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The named input payload does not exist
    #[error("markup report not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The input is not well-formed markup
    #[error("malformed markup: {message}")]
    Parse { message: String },

    /// A JSON payload does not have the normalized tree shape
    #[error("unexpected normalized tree shape: {0}")]
    Shape(String),

    /// IO error while reading or writing a payload
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON encoding/decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConvertError {
    /// Whether the failure means the input was missing rather than malformed.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConvertError::NotFound { .. })
    }
}

/// Result type for conversion operations.
pub type Result<T> = std::result::Result<T, ConvertError>;
