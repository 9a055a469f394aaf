//! Error types for the data model

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, ModelError>;

/// Data model errors
#[derive(Error, Debug)]
pub enum ModelError {
    /// A lexical value could not be read as a timestamp
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// A lexical value could not be read as a number
    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    /// Bucket not found in the registry
    #[error("Unknown bucket: {0}")]
    UnknownBucket(String),
}
