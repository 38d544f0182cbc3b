//! Error types for the core library.

use thiserror::Error;

use crate::api::ApiError;

/// Errors that can occur in core operations outside the sync loop.
#[derive(Debug, Error)]
pub enum Error {
    /// Remote API call failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// A folder identifier that does not name one of the five folders.
    #[error("Invalid folder: {0}")]
    InvalidFolder(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
