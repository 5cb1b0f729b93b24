//! Service descriptor types and structures.
//!
//! This module defines the data structures for service descriptors parsed from
//! a raw nested mapping. Only `service_key` is mandatory; every other field has
//! a default. Parsing is lenient below the descriptor level: endpoints without
//! a URL or with an unsupported method are skipped, out-of-range signal
//! weights are clamped, and incomplete signals are kept but never match.

use crate::error::{DescriptorError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tessera_core::ServiceKey;
use tracing::warn;

/// Delay between checks when a descriptor recommends none.
pub const DEFAULT_RECOMMENDED_DELAY_SECS: u64 = 2;

const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// Complete, validated description of one external service.
///
/// Immutable after load.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceDescriptor {
    /// Descriptor schema version
    pub schema_version: u32,

    /// Unique service identifier
    pub service_key: ServiceKey,

    /// Human-readable service name
    pub display_name: String,

    /// Free-form description
    pub description: String,

    /// Whether probes should only run through a proxy
    pub requires_proxy: bool,

    /// Suggested upper bound on concurrent workers
    pub max_threads: u32,

    /// Timeout hints
    pub timeouts: Timeouts,

    /// Rate-limit hints
    pub rate_limits: RateLimits,

    /// Suggested delay between checks, in seconds
    pub recommended_delay: Option<u64>,

    /// Endpoints, executed in order
    pub endpoints: Vec<Endpoint>,
}

impl ServiceDescriptor {
    /// Parse a descriptor from a raw nested mapping.
    ///
    /// # Errors
    /// Returns error if `service_key` is absent or invalid, or if a field has
    /// the wrong type.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let raw: RawDescriptor = serde_json::from_value(value)?;

        let key = raw.service_key.ok_or(DescriptorError::MissingServiceKey)?;
        let service_key = ServiceKey::new(&key)?;

        let display_name = raw
            .display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| service_key.to_string());

        let mut endpoints = Vec::new();
        for entry in raw.endpoints {
            if !entry.is_object() {
                continue;
            }
            let raw_endpoint: RawEndpoint = serde_json::from_value(entry)?;
            if let Some(endpoint) = raw_endpoint.into_endpoint() {
                endpoints.push(endpoint);
            }
        }

        Ok(Self {
            schema_version: raw.schema_version,
            service_key,
            display_name,
            description: raw.description.trim().to_string(),
            requires_proxy: raw.requires_proxy,
            max_threads: raw.max_threads,
            timeouts: raw.timeouts,
            rate_limits: raw.rate_limits,
            recommended_delay: raw.recommended_delay,
            endpoints,
        })
    }

    /// Get the service key.
    #[must_use]
    pub fn key(&self) -> &ServiceKey {
        &self.service_key
    }

    /// Effective per-request timeout.
    ///
    /// Uses `timeouts.request` when present, otherwise `default_secs`, and is
    /// never shorter than one second.
    #[must_use]
    pub fn request_timeout(&self, default_secs: u64) -> Duration {
        Duration::from_secs(self.timeouts.request.unwrap_or(default_secs).max(1))
    }

    /// Recommended delay between checks.
    #[must_use]
    pub fn recommended_delay(&self) -> Duration {
        Duration::from_secs(
            self.recommended_delay
                .unwrap_or(DEFAULT_RECOMMENDED_DELAY_SECS),
        )
    }

    /// Validate the descriptor for completeness and correctness.
    pub fn validate(&self) -> Result<()> {
        if self.display_name.is_empty() {
            return Err(self.invalid("display name cannot be empty"));
        }

        for endpoint in &self.endpoints {
            if !HTTP_METHODS.contains(&endpoint.method.as_str()) {
                return Err(self.invalid(&format!(
                    "endpoint '{}' uses unsupported method '{}'",
                    endpoint.name, endpoint.method
                )));
            }

            for signal in endpoint
                .success_signals
                .iter()
                .chain(&endpoint.failure_signals)
            {
                signal.validate().map_err(|reason| {
                    self.invalid(&format!("endpoint '{}': {reason}", endpoint.name))
                })?;
            }
        }

        Ok(())
    }

    fn invalid(&self, reason: &str) -> DescriptorError {
        DescriptorError::ValidationError {
            service_key: self.service_key.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Timeout hints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Per-request timeout in seconds
    pub request: Option<u64>,
}

/// Rate-limit hints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimits {
    /// Requests per minute the service tolerates
    pub rpm: Option<u32>,
    /// Burst size the service tolerates
    pub burst: Option<u32>,
}

/// One HTTP call template within a descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct Endpoint {
    /// Step name, used in logs
    pub name: String,

    /// Uppercased HTTP method
    pub method: String,

    /// URL template
    pub url: String,

    /// Header templates
    pub headers: BTreeMap<String, serde_json::Value>,

    /// Query parameter templates
    pub query: BTreeMap<String, serde_json::Value>,

    /// Form body templates
    pub body: BTreeMap<String, serde_json::Value>,

    /// Signals that raise confidence when matched
    pub success_signals: Vec<Signal>,

    /// Signals that lower confidence when matched
    pub failure_signals: Vec<Signal>,

    /// Retry policy for transient responses
    pub retry: RetryPolicy,

    /// Registered name of a signing hook, if any
    pub signer: Option<String>,

    /// Parameters handed to the signing hook
    pub signer_params: BTreeMap<String, String>,
}

/// Retry policy for one endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Extra attempts allowed after the first
    pub max_retries: u32,
    /// Sleep between attempts in milliseconds
    pub backoff_ms: u64,
}

impl RetryPolicy {
    /// Backoff as a duration.
    #[must_use]
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// What a signal inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// HTTP status code
    Status,
    /// Top-level field of a JSON object body
    JsonPath,
    /// Regular expression over the raw body text
    Regex,
}

/// A weighted rule matched against a response.
#[derive(Debug, Clone, Serialize)]
pub struct Signal {
    /// What the signal inspects
    #[serde(rename = "type")]
    pub kind: SignalKind,

    /// Target value for `status` and `json_path` signals
    pub equals: Option<serde_json::Value>,

    /// Field path for `json_path` signals (`$.field` or `field`)
    pub path: Option<String>,

    /// Pattern for `regex` signals
    pub pattern: Option<String>,

    /// Normalized weight in `[0, 1]`, scaled by 100 when evaluated
    pub weight: f64,

    #[serde(skip)]
    regex: Option<Regex>,
}

impl Signal {
    /// Create a signal, compiling its pattern if it has one.
    ///
    /// An invalid pattern leaves the signal unable to match.
    #[must_use]
    pub fn new(
        kind: SignalKind,
        equals: Option<serde_json::Value>,
        path: Option<String>,
        pattern: Option<String>,
        weight: f64,
    ) -> Self {
        let regex = pattern.as_deref().and_then(|p| match Regex::new(p) {
            Ok(regex) => Some(regex),
            Err(e) => {
                warn!(pattern = %p, error = %e, "signal pattern does not compile");
                None
            }
        });

        Self {
            kind,
            equals,
            path,
            pattern,
            weight,
            regex,
        }
    }

    /// Signal matching an HTTP status code.
    #[must_use]
    pub fn status(code: u16, weight: f64) -> Self {
        Self::new(SignalKind::Status, Some(code.into()), None, None, weight)
    }

    /// Signal matching a top-level JSON field.
    #[must_use]
    pub fn json_path(path: &str, equals: serde_json::Value, weight: f64) -> Self {
        Self::new(
            SignalKind::JsonPath,
            Some(equals),
            Some(path.to_string()),
            None,
            weight,
        )
    }

    /// Signal matching a regular expression against the body.
    #[must_use]
    pub fn regex(pattern: &str, weight: f64) -> Self {
        Self::new(
            SignalKind::Regex,
            None,
            None,
            Some(pattern.to_string()),
            weight,
        )
    }

    /// Compiled pattern, if the signal has a valid one.
    #[must_use]
    pub fn compiled_regex(&self) -> Option<&Regex> {
        self.regex.as_ref()
    }

    /// Field name with any leading `$.` removed.
    #[must_use]
    pub fn json_key(&self) -> Option<&str> {
        self.path
            .as_deref()
            .map(|p| p.strip_prefix("$.").unwrap_or(p))
    }

    /// Contribution to the confidence score when matched.
    #[must_use]
    pub fn score(&self) -> f64 {
        self.weight * 100.0
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if (0.0..=1.0).contains(&self.weight) {
            Ok(())
        } else {
            Err(format!("signal weight must be within 0..1, got {}", self.weight))
        }
    }

    /// Why the signal can never match, if it can't.
    fn check_complete(&self) -> std::result::Result<(), String> {
        match self.kind {
            SignalKind::Status | SignalKind::JsonPath if self.equals.is_none() => {
                Err(format!("{:?} signal requires 'equals'", self.kind))
            }
            SignalKind::JsonPath if self.path.is_none() => {
                Err("json_path signal requires 'path'".to_string())
            }
            SignalKind::Regex if self.regex.is_none() => Err(format!(
                "regex signal has a missing or invalid pattern: {:?}",
                self.pattern
            )),
            _ => Ok(()),
        }
    }
}

fn default_schema_version() -> u32 {
    1
}

fn default_max_threads() -> u32 {
    1
}

fn default_endpoint_name() -> String {
    "step".to_string()
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_weight() -> f64 {
    0.5
}

fn default_signal_kind() -> SignalKind {
    SignalKind::Status
}

#[derive(Deserialize)]
struct RawDescriptor {
    #[serde(default = "default_schema_version")]
    schema_version: u32,
    #[serde(default)]
    service_key: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    requires_proxy: bool,
    #[serde(default = "default_max_threads")]
    max_threads: u32,
    #[serde(default)]
    timeouts: Timeouts,
    #[serde(default)]
    rate_limits: RateLimits,
    #[serde(default)]
    recommended_delay: Option<u64>,
    #[serde(default)]
    endpoints: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawEndpoint {
    #[serde(default = "default_endpoint_name")]
    name: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    headers: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    query: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    body: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    success_signals: Vec<RawSignal>,
    #[serde(default)]
    failure_signals: Vec<RawSignal>,
    #[serde(default)]
    retry: Option<RetryPolicy>,
    #[serde(default)]
    signer: Option<String>,
    #[serde(default)]
    signer_params: BTreeMap<String, String>,
}

impl RawEndpoint {
    fn into_endpoint(self) -> Option<Endpoint> {
        let url = self.url.filter(|u| !u.is_empty())?;

        let method = self.method.to_uppercase();
        if !HTTP_METHODS.contains(&method.as_str()) {
            warn!(endpoint = %self.name, method = %method, "skipping endpoint with unsupported method");
            return None;
        }

        let name = self.name;
        let signals = |raw: Vec<RawSignal>| -> Vec<Signal> {
            raw.into_iter().map(|signal| signal.into_signal(&name)).collect()
        };
        let success_signals = signals(self.success_signals);
        let failure_signals = signals(self.failure_signals);

        Some(Endpoint {
            name,
            method,
            url,
            headers: self.headers,
            query: self.query,
            body: self.body,
            success_signals,
            failure_signals,
            retry: self.retry.unwrap_or_default(),
            signer: self.signer.filter(|s| !s.is_empty()),
            signer_params: self.signer_params,
        })
    }
}

#[derive(Deserialize)]
struct RawSignal {
    #[serde(rename = "type", default = "default_signal_kind")]
    kind: SignalKind,
    #[serde(default)]
    equals: Option<serde_json::Value>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default = "default_weight")]
    weight: f64,
}

impl RawSignal {
    fn into_signal(self, endpoint: &str) -> Signal {
        let weight = if self.weight.is_nan() {
            0.0
        } else {
            self.weight.clamp(0.0, 1.0)
        };
        if (weight - self.weight).abs() > f64::EPSILON || self.weight.is_nan() {
            warn!(endpoint, weight = self.weight, clamped = weight, "signal weight out of range");
        }

        let signal = Signal::new(self.kind, self.equals, self.path, self.pattern, weight);
        if let Err(reason) = signal.check_complete() {
            warn!(endpoint, "{reason}; the signal will never match");
        }
        signal
    }
}
