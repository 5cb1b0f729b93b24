//! Tessera Descriptor - Data-only service descriptors.
//!
//! This crate provides the types and functionality for describing how to probe
//! one external service. Descriptors are plain data: ordered HTTP endpoints
//! with string templates, weighted response signals and a retry policy. They
//! are loaded from JSON, YAML or TOML files and indexed in a registry that is
//! built once at startup.
//!
//! # Architecture
//!
//! - **Definition Types** ([`definition`]): Descriptor, endpoint, signal and retry structures
//! - **Templates** ([`template`]): `${name}` substitution against a per-check context
//! - **Loader** ([`loader`]): Descriptor file discovery with format precedence
//! - **Registry** ([`registry`]): Key lookup with flexible name resolution
//! - **Errors** ([`error`]): Descriptor-specific error types
//!
//! # Example
//!
//! ```rust
//! use tessera_descriptor::{RenderContext, ServiceDescriptor};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let descriptor = ServiceDescriptor::from_value(serde_json::json!({
//!     "service_key": "example",
//!     "endpoints": [{ "url": "https://example.com/lookup?phone=${phone}" }]
//! }))?;
//!
//! let ctx = RenderContext::for_candidate("+420731234567");
//! assert_eq!(
//!     ctx.render_str(&descriptor.endpoints[0].url),
//!     "https://example.com/lookup?phone=+420731234567"
//! );
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod definition;
pub mod error;
pub mod loader;
pub mod registry;
pub mod template;

// Re-export commonly used types
pub use definition::{
    Endpoint, RateLimits, RetryPolicy, ServiceDescriptor, Signal, SignalKind, Timeouts,
};
pub use error::{DescriptorError, Result};
pub use loader::{DescriptorLoader, DescriptorSource, LoadedDescriptor};
pub use registry::{normalize_name, DescriptorRegistry};
pub use template::{value_to_string, RenderContext};
