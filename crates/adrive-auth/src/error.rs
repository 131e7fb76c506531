//! Error types for credential operations

/// Errors from credential operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("store parse error: {0}")]
    StoreParse(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("not found: {0}")]
    NotFound(String),
}

/// Result alias for credential operations.
pub type Result<T> = std::result::Result<T, Error>;
