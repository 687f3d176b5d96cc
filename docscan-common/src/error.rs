//! Common error types for docscan

use thiserror::Error;

/// Common result type for docscan operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across docscan services
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid caller input (e.g. a batch size of zero)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
