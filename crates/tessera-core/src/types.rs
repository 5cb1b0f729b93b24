//! Shared types used across the Tessera engine.
//!
//! This module defines common newtypes, result records and progress
//! snapshots that cross crate boundaries.

use crate::error::TesseraError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

/// Newtype for service identifiers with validation.
///
/// Service keys are alphanumeric with `-`, `_` or `.`, 1-64 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceKey(String);

impl ServiceKey {
    /// Create a new `ServiceKey`, trimming surrounding whitespace.
    ///
    /// # Errors
    /// Returns error if the key is empty or contains unsupported characters.
    pub fn new(key: impl AsRef<str>) -> Result<Self, TesseraError> {
        let key = key.as_ref().trim();
        Self::validate(key)?;
        Ok(Self(key.to_string()))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(key: &str) -> Result<(), TesseraError> {
        static KEY_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = KEY_REGEX
            .get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]{0,63}$").expect("valid regex"));

        if key.is_empty() {
            return Err(TesseraError::Validation(
                "invalid service key: must not be empty".to_string(),
            ));
        }

        if regex.is_match(key) {
            Ok(())
        } else {
            Err(TesseraError::Validation(format!(
                "invalid service key: must be 1-64 alphanumeric characters, '-', '_' or '.', got '{key}'"
            )))
        }
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One unit of work: a stable ordinal position and the candidate at it.
///
/// The index is the dedup key used by the work distributor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItem {
    /// Ordinal position in the precomputed candidate sequence
    pub index: usize,
    /// Candidate value (a concrete phone number)
    pub candidate: String,
}

impl WorkItem {
    /// Create a new work item.
    #[must_use]
    pub fn new(index: usize, candidate: impl Into<String>) -> Self {
        Self {
            index,
            candidate: candidate.into(),
        }
    }
}

/// Normalized status of one check against one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// An account exists for the candidate
    Found,
    /// No account exists for the candidate
    NotFound,
    /// The check could not complete
    Error,
    /// The service throttled the request
    RateLimited,
    /// The service rejected the candidate as malformed
    Invalid,
    /// Signals were inconclusive
    Unknown,
}

impl CheckStatus {
    /// Snake-case name used in serialized results.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Found => "found",
            Self::NotFound => "not_found",
            Self::Error => "error",
            Self::RateLimited => "rate_limited",
            Self::Invalid => "invalid",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a textual check outcome onto a [`CheckStatus`].
///
/// Matching is a case-insensitive substring search, checked in a fixed order.
#[must_use]
pub fn parse_legacy_status(raw: &str) -> CheckStatus {
    let s = raw.to_lowercase();
    if s.contains("[found]") {
        CheckStatus::Found
    } else if s.contains("not found") {
        CheckStatus::NotFound
    } else if s.contains("rate limited") || s.contains("429") {
        CheckStatus::RateLimited
    } else if s.contains("invalid") {
        CheckStatus::Invalid
    } else if s.contains("error") || s.contains("blocked") {
        CheckStatus::Error
    } else {
        CheckStatus::Unknown
    }
}

/// Structured result of checking one candidate against one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Display name of the service
    pub service: String,
    /// Candidate that was checked
    pub phone: String,
    /// Normalized status
    pub status: CheckStatus,
    /// Free-form details; always carries the raw outcome under `raw`
    pub details: BTreeMap<String, serde_json::Value>,
    /// When the result was produced
    pub ts: DateTime<Utc>,
    /// Error text, set only for [`CheckStatus::Error`]
    pub error: Option<String>,
}

impl CheckResult {
    /// Build a result from a textual outcome.
    #[must_use]
    pub fn from_legacy(service: impl Into<String>, phone: impl Into<String>, raw: &str) -> Self {
        let status = parse_legacy_status(raw);
        let mut details = BTreeMap::new();
        details.insert(
            "raw".to_string(),
            serde_json::Value::String(raw.to_string()),
        );
        Self {
            service: service.into(),
            phone: phone.into(),
            status,
            details,
            ts: Utc::now(),
            error: (status == CheckStatus::Error).then(|| raw.to_string()),
        }
    }

    /// Raw outcome text, if recorded.
    #[must_use]
    pub fn raw(&self) -> &str {
        self.details
            .get("raw")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
    }
}

/// Running tally of results for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run identifier
    pub run_id: String,
    /// Results seen
    pub total_checked: u64,
    /// Results with status `found`
    pub found: u64,
    /// Results with status `error`
    pub errors: u64,
    /// Results with status `rate_limited`
    pub rate_limited: u64,
}

impl RunSummary {
    /// Start an empty summary with a fresh run ID.
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            total_checked: 0,
            found: 0,
            errors: 0,
            rate_limited: 0,
        }
    }

    /// Fold one result into the tally.
    pub fn update_with(&mut self, result: &CheckResult) {
        self.total_checked += 1;
        match result.status {
            CheckStatus::Found => self.found += 1,
            CheckStatus::Error => self.errors += 1,
            CheckStatus::RateLimited => self.rate_limited += 1,
            CheckStatus::NotFound | CheckStatus::Invalid | CheckStatus::Unknown => {}
        }
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the proxy pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyPoolStatus {
    /// Proxies in the pool
    pub total: usize,
    /// Proxies selectable right now
    pub available: usize,
    /// Proxies marked unavailable
    pub cooling_down: usize,
}

/// Snapshot of the work distributor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkProgress {
    /// Items marked completed
    pub completed: usize,
    /// Items claimed and not yet resolved
    pub in_progress: usize,
    /// Items still queued
    pub remaining: usize,
}

impl WorkProgress {
    /// Completed plus in-progress items.
    #[must_use]
    pub fn total_processed(&self) -> usize {
        self.completed + self.in_progress
    }
}

/// Merged progress snapshot handed to progress sinks.
///
/// Always recomputed from the live pool and distributor, never cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunProgress {
    /// Proxy pool counts
    pub proxy_status: ProxyPoolStatus,
    /// Work distributor counts
    pub work_progress: WorkProgress,
}
