//! Error types for proxy list handling.

use thiserror::Error;

/// Errors that can occur while loading proxies.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Proxy list file could not be read
    #[error("failed to read proxy list {path}: {source}")]
    ReadError {
        /// Path to the proxy list
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },
}

/// Result type for proxy operations.
pub type Result<T> = std::result::Result<T, ProxyError>;
