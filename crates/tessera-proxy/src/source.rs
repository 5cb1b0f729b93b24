//! The proxy seam used by the protocol runtime.

use crate::pool::ProxyPool;
use tracing::debug;

/// Something that hands out proxies and accepts feedback about them.
pub trait ProxySource: Send + Sync {
    /// Acquire a proxy address, or `None` to go direct.
    fn acquire(&self) -> Option<String>;

    /// Report that `address` was rate limited.
    fn report_rate_limit(&self, address: &str);

    /// Report a failure while using `address`.
    fn report_error(&self, address: &str);
}

impl ProxySource for ProxyPool {
    fn acquire(&self) -> Option<String> {
        self.get_available_proxy()
    }

    fn report_rate_limit(&self, address: &str) {
        ProxyPool::report_rate_limit(self, address);
    }

    fn report_error(&self, address: &str) {
        ProxyPool::report_error(self, address);
    }
}

/// A single proxy chosen ahead of a check.
///
/// Feedback is only logged; whoever chose the proxy routes it to the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedProxy {
    address: String,
}

impl PinnedProxy {
    /// Pin `address` for one check.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    /// The pinned address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl ProxySource for PinnedProxy {
    fn acquire(&self) -> Option<String> {
        Some(self.address.clone())
    }

    fn report_rate_limit(&self, address: &str) {
        debug!(proxy = %address, "rate limit observed on pinned proxy");
    }

    fn report_error(&self, address: &str) {
        debug!(proxy = %address, "error observed on pinned proxy");
    }
}
