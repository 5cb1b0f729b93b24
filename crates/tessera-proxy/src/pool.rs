//! Proxy pool with round-robin acquisition and lazy cooldown recovery.

use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tessera_core::{ProxyConfig, ProxyPoolStatus};
use tracing::{debug, info, warn};

/// Cooldowns longer than this are clamped so the deadline stays representable.
const MAX_COOLDOWN: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// State of one proxy address within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRecord {
    /// Proxy URL
    pub address: String,
    /// Whether the proxy may be selected
    pub available: bool,
    /// End of the current cooldown, if one was ever imposed
    pub cooldown_until: Option<Instant>,
    /// Last time the proxy was handed out
    pub last_used: Option<Instant>,
    /// Errors and rate limits reported against this proxy
    pub error_count: u32,
}

impl ProxyRecord {
    /// Create a fresh, available record.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            available: true,
            cooldown_until: None,
            last_used: None,
            error_count: 0,
        }
    }

    /// Whether the cooldown, if any, has elapsed at `now`.
    #[must_use]
    pub fn is_cooled_down(&self, now: Instant) -> bool {
        self.cooldown_until.map_or(true, |until| now >= until)
    }

    fn set_cooldown(&mut self, duration: Duration) {
        let now = Instant::now();
        let until = now
            .checked_add(duration)
            .or_else(|| now.checked_add(MAX_COOLDOWN))
            .unwrap_or(now);
        self.cooldown_until = Some(until);
        self.available = false;
    }

    fn reset_cooldown(&mut self) {
        self.cooldown_until = None;
        self.available = true;
    }
}

struct PoolState {
    records: Vec<ProxyRecord>,
    cursor: usize,
}

/// Thread-safe pool over a fixed list of proxy addresses.
///
/// Every operation takes the same lock.
pub struct ProxyPool {
    state: Mutex<PoolState>,
    rate_limit_cooldown: Duration,
    error_cooldown: Duration,
    error_threshold: u32,
}

impl ProxyPool {
    /// Create a pool with the default cooldown settings.
    #[must_use]
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_config(addresses, &ProxyConfig::default())
    }

    /// Create a pool with cooldowns taken from `config`.
    #[must_use]
    pub fn with_config<I, S>(addresses: I, config: &ProxyConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let records = addresses.into_iter().map(ProxyRecord::new).collect();
        Self::from_records(records, config)
    }

    /// Create a pool from prepared records.
    #[must_use]
    pub fn from_records(records: Vec<ProxyRecord>, config: &ProxyConfig) -> Self {
        info!(count = records.len(), "initialized proxy pool");
        Self {
            state: Mutex::new(PoolState { records, cursor: 0 }),
            rate_limit_cooldown: Duration::from_secs(config.rate_limit_cooldown_secs),
            error_cooldown: Duration::from_secs(config.error_cooldown_secs),
            error_threshold: config.error_threshold.max(1),
        }
    }

    /// Number of proxies in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    /// Whether the pool has no proxies at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().records.is_empty()
    }

    /// Acquire the next available proxy.
    ///
    /// Rotates round-robin over the proxies that are available now. When
    /// none are, the first unavailable proxy whose cooldown has elapsed is
    /// reset and returned.
    #[must_use]
    pub fn get_available_proxy(&self) -> Option<String> {
        let mut state = self.state.lock();
        let now = Instant::now();

        let ready: Vec<usize> = state
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.available && r.is_cooled_down(now))
            .map(|(i, _)| i)
            .collect();

        if !ready.is_empty() {
            let pick = ready[state.cursor % ready.len()];
            state.cursor = (state.cursor + 1) % ready.len();
            let record = &mut state.records[pick];
            record.last_used = Some(now);
            return Some(record.address.clone());
        }

        let record = state
            .records
            .iter_mut()
            .find(|r| !r.available && r.is_cooled_down(now))?;
        record.reset_cooldown();
        record.last_used = Some(now);
        debug!(proxy = %record.address, "proxy recovered from cooldown");
        Some(record.address.clone())
    }

    /// Record a rate limit: the proxy cools down for the rate-limit period.
    pub fn report_rate_limit(&self, address: &str) {
        let mut state = self.state.lock();
        if let Some(record) = state.records.iter_mut().find(|r| r.address == address) {
            record.set_cooldown(self.rate_limit_cooldown);
            record.error_count += 1;
            warn!(
                proxy = %address,
                cooldown_secs = self.rate_limit_cooldown.as_secs(),
                "proxy rate limited, cooling down"
            );
        }
    }

    /// Record an error; once the threshold is reached the proxy cools down.
    pub fn report_error(&self, address: &str) {
        let mut state = self.state.lock();
        if let Some(record) = state.records.iter_mut().find(|r| r.address == address) {
            record.error_count += 1;
            if record.error_count >= self.error_threshold {
                record.set_cooldown(self.error_cooldown);
                warn!(
                    proxy = %address,
                    errors = record.error_count,
                    cooldown_secs = self.error_cooldown.as_secs(),
                    "proxy failing repeatedly, cooling down"
                );
            } else {
                debug!(proxy = %address, errors = record.error_count, "proxy error reported");
            }
        }
    }

    /// Counts computed fresh under the lock.
    #[must_use]
    pub fn get_status(&self) -> ProxyPoolStatus {
        let state = self.state.lock();
        let now = Instant::now();
        ProxyPoolStatus {
            total: state.records.len(),
            available: state
                .records
                .iter()
                .filter(|r| r.available && r.is_cooled_down(now))
                .count(),
            cooling_down: state.records.iter().filter(|r| !r.available).count(),
        }
    }

    /// Snapshot of every record.
    #[must_use]
    pub fn records(&self) -> Vec<ProxyRecord> {
        self.state.lock().records.clone()
    }
}

impl std::fmt::Debug for ProxyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyPool")
            .field("status", &self.get_status())
            .finish_non_exhaustive()
    }
}
