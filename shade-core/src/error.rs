//! Error types for Shade

use thiserror::Error;

/// Shade error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Namespace operation failed
    #[error("Namespace error: {message}")]
    Namespace {
        /// Error message
        message: String,
    },

    /// A namespace id outside the supported range
    #[error("Invalid namespace id: {id}")]
    InvalidNamespace {
        /// Offending id
        id: i64,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// System error from nix
    #[error("System error: {0}")]
    System(#[from] nix::Error),
}

/// Result type alias for Shade operations
pub type Result<T> = std::result::Result<T, Error>;
