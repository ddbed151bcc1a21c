//! Engine-wide error type for the buffer aggregation layer
//!
//! Every error in this crate is recoverable: the call that produced it is a
//! no-op and registry state stays consistent.

use thiserror::Error;

/// Result alias used across the crate
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Empty buffer spec list requested for role '{role}'")]
    EmptyBufferSpecs { role: String },

    #[error("Empty source list for {context}")]
    EmptySources { context: String },

    #[error("Buffer array range is null or invalid: {context}")]
    InvalidRange { context: String },

    #[error("Source buffer for '{name}' is invalid")]
    InvalidSource { name: String },

    #[error("Index {index} out of range (size {size})")]
    InvalidIndex { index: i64, size: usize },

    #[error("{resource_type} not found: {id}")]
    ResourceNotFound { resource_type: String, id: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::Config {
            message: err.to_string(),
        }
    }
}
