//! Positive results collected during a run.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tessera_core::{CheckResult, CheckStatus};

/// A candidate confirmed on one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundAccount {
    /// Candidate phone number
    pub number: String,
    /// Display name of the service
    pub platform: String,
    /// Normalized status (always `found` when produced by the coordinator)
    pub status: CheckStatus,
    /// Details carried over from the check result
    pub details: BTreeMap<String, serde_json::Value>,
    /// When the account was recorded
    pub timestamp: DateTime<Utc>,
    /// Ordinal index of the work item
    pub index: usize,
    /// Worker that found it; `None` in sequential mode
    pub worker_id: Option<usize>,
}

impl FoundAccount {
    /// Build an entry from a check result.
    #[must_use]
    pub fn from_result(result: &CheckResult, index: usize, worker_id: Option<usize>) -> Self {
        Self {
            number: result.phone.clone(),
            platform: result.service.clone(),
            status: result.status,
            details: result.details.clone(),
            timestamp: Utc::now(),
            index,
            worker_id,
        }
    }
}

/// Append-only found-list shared by workers.
#[derive(Debug, Default)]
pub(crate) struct FoundList {
    entries: Mutex<Vec<FoundAccount>>,
}

impl FoundList {
    pub(crate) fn push(&self, account: FoundAccount) {
        self.entries.lock().push(account);
    }

    pub(crate) fn snapshot(&self) -> Vec<FoundAccount> {
        self.entries.lock().clone()
    }
}
