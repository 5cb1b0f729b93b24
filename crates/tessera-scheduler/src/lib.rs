//! Tessera Scheduler - run coordination for the Tessera probing engine.
//!
//! Distributes a fixed candidate sequence across a pool of OS threads, each
//! pulling work, leasing a proxy, running every enabled service check and
//! routing the outcome back to the proxy pool and the found-list.
//!
//! # Modules
//!
//! - [`distributor`] - Dedup'd FIFO work distribution
//! - [`control`] - Stop, pause and auto-continue signals plus operator hooks
//! - [`coordinator`] - The worker pool and its per-item routing
//! - [`found`] - Found-account records
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tessera_core::{CheckResult, WorkItem};
//! use tessera_proxy::ProxySource;
//! use tessera_scheduler::{CandidateChecker, Coordinator, RunSettings};
//!
//! struct Nobody;
//!
//! impl CandidateChecker for Nobody {
//!     fn check(&self, candidate: &str, _: Option<&dyn ProxySource>) -> Vec<CheckResult> {
//!         vec![CheckResult::from_legacy("Example", candidate, "[NOT FOUND]: nothing")]
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = RunSettings {
//!     threads: 2,
//!     delay: std::time::Duration::ZERO,
//!     ..RunSettings::default()
//! };
//! let coordinator = Coordinator::new(Arc::new(Nobody), settings);
//! let items = (1..=4).map(|i| WorkItem::new(i, format!("+42073123450{i}")));
//! let report = coordinator.run(items, Vec::new())?;
//! assert_eq!(report.completed, 4);
//! assert!(report.found.is_empty());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod control;
pub mod coordinator;
pub mod distributor;
pub mod error;
pub mod found;

// Re-export commonly used types
pub use control::{PauseDecision, PauseResolver, ProgressSink, RunControl};
pub use coordinator::{CandidateChecker, Coordinator, RunReport, RunSettings};
pub use distributor::WorkDistributor;
pub use error::{Result, SchedulerError};
pub use found::FoundAccount;
