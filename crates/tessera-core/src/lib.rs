//! Tessera Core - Foundation crate for the Tessera probing engine.
//!
//! This crate provides shared types, error handling, configuration management,
//! and candidate generation that all other Tessera crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and records (`ServiceKey`, `WorkItem`, `CheckResult`, progress snapshots)
//! - [`candidates`] - Lazy expansion of wildcard phone patterns into work items
//!
//! # Example
//!
//! ```rust
//! use tessera_core::{AppConfig, CandidatePattern};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! let pattern = CandidatePattern::parse("+420 731x4x748", config.candidates.max_wildcards)?;
//! let items = pattern.work_items(false, 0, config.candidates.max_variations);
//! assert_eq!(items.len(), 100);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod candidates;
pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use candidates::{CandidatePattern, Candidates, CountryPattern};
pub use config::{
    AppConfig, CandidateConfig, DescriptorConfig, GeneralConfig, ProbingConfig, ProxyConfig,
    WorkerConfig,
};
pub use error::{ConfigError, ConfigResult, Result, TesseraError};
pub use types::{
    parse_legacy_status, CheckResult, CheckStatus, ProxyPoolStatus, RunProgress, RunSummary,
    ServiceKey, WorkItem, WorkProgress,
};
