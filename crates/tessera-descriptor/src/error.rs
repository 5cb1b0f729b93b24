//! Error types for the descriptor subsystem.

use thiserror::Error;

/// Errors that can occur in descriptor operations.
#[derive(Error, Debug)]
pub enum DescriptorError {
    /// Descriptor not found in the registry
    #[error("service descriptor not found: {service_key}")]
    NotFound {
        /// The key or name that was looked up
        service_key: String,
    },

    /// The mandatory `service_key` field is absent
    #[error("descriptor is missing the required 'service_key' field")]
    MissingServiceKey,

    /// Failed to read a descriptor file
    #[error("failed to load descriptor from {path}: {source}")]
    LoadError {
        /// Path to the descriptor file
        path: String,
        /// Underlying error
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to parse descriptor contents
    #[error("failed to parse descriptor in {path}: {reason}")]
    ParseError {
        /// Path to the descriptor file
        path: String,
        /// Parser message
        reason: String,
    },

    /// Descriptor fields have the wrong shape
    #[error("malformed descriptor: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Invalid descriptor (validation failed)
    #[error("invalid descriptor for {service_key}: {reason}")]
    ValidationError {
        /// Service key being validated
        service_key: String,
        /// Reason for validation failure
        reason: String,
    },

    /// Descriptor directory not found
    #[error("descriptor directory not found at {path}")]
    DirectoryNotFound {
        /// Expected directory path
        path: String,
    },

    /// I/O error while accessing descriptor files
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid service key format
    #[error("invalid service key: {0}")]
    InvalidKey(#[from] tessera_core::TesseraError),
}

/// Result type for descriptor operations.
pub type Result<T> = std::result::Result<T, DescriptorError>;
