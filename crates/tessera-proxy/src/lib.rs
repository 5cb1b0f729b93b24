//! Tessera Proxy - Thread-safe proxy rotation with cooldown tracking.
//!
//! This crate manages a fixed set of outbound proxy addresses for one run.
//! Workers acquire proxies round-robin from the currently available subset and
//! report rate limits and errors back, which place proxies on cooldown.
//! Cooldowns are cleared lazily when acquisition finds nothing else available.
//!
//! # Example
//!
//! ```rust
//! use tessera_proxy::{ProxyPool, ProxySource};
//!
//! let pool = ProxyPool::new(["http://10.0.0.1:8080", "http://10.0.0.2:8080"]);
//! let proxy = pool.acquire().expect("a proxy is available");
//! pool.report_rate_limit(&proxy);
//!
//! let status = pool.get_status();
//! assert_eq!(status.total, 2);
//! assert_eq!(status.cooling_down, 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod list;
pub mod pool;
pub mod source;

// Re-export commonly used types
pub use error::{ProxyError, Result};
pub use list::{load_proxies, parse_proxy_list};
pub use pool::{ProxyPool, ProxyRecord};
pub use source::{PinnedProxy, ProxySource};
