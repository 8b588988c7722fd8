//! Error type for gofem-io (§7, "I/O" row).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IoError>;

#[derive(Error, Debug)]
pub enum IoError {
    #[error("checkpoint file not found: {0}")]
    FileNotFound(String),

    #[error("decoder mismatch: expected {expected}, found {found}")]
    DecoderMismatch { expected: String, found: String },

    #[error("dimension mismatch on import: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("element payload schema error: {0}")]
    SchemaError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
