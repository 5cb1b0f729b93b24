//! Classified results of one check.

use crate::error::{SignerError, TransportError};
use std::fmt;
use tessera_core::{parse_legacy_status, CheckStatus};

/// Why a check ended early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    /// A transport error aborted the check
    Transport(TransportError),
    /// A signing hook failed
    Signer(SignerError),
}

/// Classification of one descriptor run against one candidate.
///
/// The `Display` form is the textual outcome consumed by the status mapping
/// in [`tessera_core::parse_legacy_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Confidence reached the threshold
    Found,
    /// Some positive confidence below the threshold
    Inconclusive,
    /// The last response was HTTP 429
    RateLimited,
    /// No signal pushed confidence above zero
    NotFound,
    /// The check was aborted
    Error(ProbeFailure),
}

impl ProbeOutcome {
    /// Normalized status of this outcome.
    #[must_use]
    pub fn status(&self) -> CheckStatus {
        parse_legacy_status(&self.to_string())
    }

    /// Whether the outcome indicates the proxy itself was refused.
    #[must_use]
    pub fn is_block(&self) -> bool {
        matches!(self, Self::Error(_)) && self.to_string().to_lowercase().contains("blocked")
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found => f.write_str("[FOUND]: Confirmed by descriptor signals"),
            Self::Inconclusive => f.write_str("[UNKNOWN]: Signals inconclusive"),
            Self::RateLimited => f.write_str("[RATE LIMITED]: Too many requests"),
            Self::NotFound => f.write_str("[NOT FOUND]: No signals matched"),
            Self::Error(ProbeFailure::Signer(e)) => write!(f, "[ERROR]: Signer failed: {e}"),
            Self::Error(ProbeFailure::Transport(e)) => match e {
                TransportError::Timeout => f.write_str("[ERROR]: Request timeout"),
                TransportError::Proxy(_) => f.write_str("[ERROR]: Proxy connection failed"),
                TransportError::Connect(_) => f.write_str("[ERROR]: Connection failed"),
                TransportError::Other(msg) => write!(f, "[ERROR]: {msg}"),
            },
        }
    }
}

/// Outcome of one check plus how it was reached.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    /// Classification
    pub outcome: ProbeOutcome,
    /// Final confidence score
    pub confidence: f64,
    /// Status of the last response received
    pub last_status: Option<u16>,
    /// HTTP requests issued
    pub requests: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_text_and_status() {
        let cases = [
            (ProbeOutcome::Found, CheckStatus::Found),
            (ProbeOutcome::Inconclusive, CheckStatus::Unknown),
            (ProbeOutcome::RateLimited, CheckStatus::RateLimited),
            (ProbeOutcome::NotFound, CheckStatus::NotFound),
            (
                ProbeOutcome::Error(ProbeFailure::Transport(TransportError::Timeout)),
                CheckStatus::Error,
            ),
            (
                ProbeOutcome::Error(ProbeFailure::Signer(SignerError::Failed("bad key".into()))),
                CheckStatus::Error,
            ),
        ];

        for (outcome, status) in cases {
            assert_eq!(outcome.status(), status, "{outcome}");
        }

        assert_eq!(
            ProbeOutcome::Error(ProbeFailure::Transport(TransportError::Proxy("x".into())))
                .to_string(),
            "[ERROR]: Proxy connection failed"
        );
    }

    #[test]
    fn test_is_block() {
        let blocked = ProbeOutcome::Error(ProbeFailure::Transport(TransportError::Other(
            "request blocked by upstream".into(),
        )));
        assert!(blocked.is_block());
        assert!(!ProbeOutcome::Error(ProbeFailure::Transport(TransportError::Timeout)).is_block());
        assert!(!ProbeOutcome::NotFound.is_block());
    }
}
