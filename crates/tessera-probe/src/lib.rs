//! Tessera Probe - Declarative protocol runtime.
//!
//! This crate executes service descriptors against candidate values. A
//! [`ProbeRuntime`] renders each endpoint's templates, applies an optional
//! signing hook, sends the request through an [`HttpTransport`], scores the
//! response against weighted signals and classifies the check as a
//! [`ProbeOutcome`].
//!
//! # Architecture
//!
//! - **Transport** ([`transport`]): HTTP seam with a blocking `reqwest` implementation
//! - **Signals** ([`signals`]): status, JSON field and regex matching
//! - **Signers** ([`signer`]): name → hook registry injected at startup
//! - **Runtime** ([`runtime`]): the per-check endpoint loop with retry and early exit
//! - **Checker** ([`checker`]): one candidate against every enabled service
//!
//! Errors never escape a check: transport and signer failures become
//! [`ProbeOutcome::Error`] values.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod checker;
pub mod error;
pub mod outcome;
pub mod runtime;
pub mod signals;
pub mod signer;
pub mod transport;

// Re-export commonly used types
pub use checker::ServiceChecker;
pub use error::{ProbeError, Result, SignerError, TransportError};
pub use outcome::{ProbeFailure, ProbeOutcome, ProbeReport};
pub use runtime::{ProbeRuntime, ProbeSettings, DEFAULT_CONFIRMATION_THRESHOLD};
pub use signer::{RequestParts, Signer, SignerRegistry};
pub use transport::{
    HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, DEFAULT_USER_AGENT,
};
