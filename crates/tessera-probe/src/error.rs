//! Error types for the protocol runtime.

use thiserror::Error;

/// Errors raised while issuing one HTTP request.
///
/// The runtime never lets these escape a check; each one becomes an error
/// outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request did not complete within its timeout
    #[error("request timeout")]
    Timeout,

    /// The proxy could not be used or refused the connection
    #[error("proxy connection failed: {0}")]
    Proxy(String),

    /// The target could not be reached
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other transport failure
    #[error("{0}")]
    Other(String),
}

/// Errors raised by signing hooks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    /// No signer is registered under the requested name
    #[error("signer not registered: {0}")]
    NotRegistered(String),

    /// The signer ran and failed
    #[error("{0}")]
    Failed(String),
}

/// Errors that can occur while setting up probes.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// HTTP client construction failed
    #[error("failed to create HTTP client: {0}")]
    ClientBuild(String),

    /// Descriptor lookup failed
    #[error("descriptor error: {0}")]
    Descriptor(#[from] tessera_descriptor::DescriptorError),

    /// Transport failure outside a check
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Signer failure outside a check
    #[error("signer error: {0}")]
    Signer(#[from] SignerError),
}

/// Result type for probe operations.
pub type Result<T> = std::result::Result<T, ProbeError>;
