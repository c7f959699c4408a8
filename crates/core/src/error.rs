//! Error types for the tagging domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
