//! Error types for the bucketizer

use thiserror::Error;

/// Bucketizer errors
#[derive(Error, Debug)]
pub enum BucketizerError {
    /// A time-ordered strategy received a member older than what it already
    /// accepted. The caller must supply a time-ordered stream; this is a
    /// broken precondition, not a retryable condition.
    #[error("Out-of-order member in bucket {bucket}: got {got}, expected >= {expected}")]
    OutOfOrderMember {
        bucket: String,
        got: String,
        expected: String,
    },

    /// Invalid strategy configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A persisted bucket key could not be decoded
    #[error("Corrupt bucket key: {0}")]
    CorruptKey(String),

    /// State serialization error
    #[error("State error: {0}")]
    State(#[from] serde_json::Error),

    /// Error from the data model
    #[error("Model error: {0}")]
    Model(#[from] ldes_model::ModelError),
}

/// Result type for bucketizer operations
pub type Result<T> = std::result::Result<T, BucketizerError>;
