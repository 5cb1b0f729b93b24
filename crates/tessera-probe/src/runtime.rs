//! Execution of one descriptor against one candidate.

use crate::outcome::{ProbeFailure, ProbeOutcome, ProbeReport};
use crate::signals;
use crate::signer::{RequestParts, SignerRegistry};
use crate::transport::{HttpRequest, HttpTransport};
use std::collections::BTreeMap;
use std::sync::Arc;
use tessera_core::ProbingConfig;
use tessera_descriptor::{value_to_string, Endpoint, RenderContext, ServiceDescriptor};
use tessera_proxy::ProxySource;
use tracing::{debug, info, warn};

/// Confidence at which a check is decided as found.
pub const DEFAULT_CONFIRMATION_THRESHOLD: f64 = 100.0;

const PREVIEW_CHARS: usize = 200;

/// Settings shared by every runtime of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSettings {
    /// Timeout used when a descriptor sets none
    pub default_timeout_secs: u64,
    /// Confidence at which a check is decided as found
    pub confirmation_threshold: f64,
    /// Log every request under the `tessera::requests` target
    pub debug_requests: bool,
}

impl ProbeSettings {
    /// Settings from the probing configuration and environment.
    #[must_use]
    pub fn from_config(config: &ProbingConfig) -> Self {
        Self {
            default_timeout_secs: config.request_timeout_secs,
            confirmation_threshold: config.confirmation_threshold,
            debug_requests: std::env::var("TESSERA_DEBUG_REQUESTS").is_ok_and(|v| v == "1"),
        }
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self::from_config(&ProbingConfig::default())
    }
}

/// Runs one descriptor's endpoints for a candidate and classifies the result.
pub struct ProbeRuntime {
    descriptor: Arc<ServiceDescriptor>,
    transport: Arc<dyn HttpTransport>,
    signers: Arc<SignerRegistry>,
    settings: ProbeSettings,
}

impl ProbeRuntime {
    /// Create a runtime for `descriptor`.
    #[must_use]
    pub fn new(
        descriptor: Arc<ServiceDescriptor>,
        transport: Arc<dyn HttpTransport>,
        signers: Arc<SignerRegistry>,
        settings: ProbeSettings,
    ) -> Self {
        Self {
            descriptor,
            transport,
            signers,
            settings,
        }
    }

    /// The descriptor this runtime executes.
    #[must_use]
    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    /// Display name of the service.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.descriptor.display_name
    }

    /// Check one candidate.
    ///
    /// Endpoints run in order and their signal scores accumulate into one
    /// confidence value. Reaching the threshold ends the check as found.
    /// Responses with status 429 or 5xx are retried within the endpoint's
    /// retry budget; everything else is definitive. Transport and signer
    /// failures end the check immediately.
    ///
    /// Transport failures and a final rate limit are reported to `proxies`.
    pub fn check(&self, candidate: &str, proxies: Option<&dyn ProxySource>) -> ProbeReport {
        let ctx = RenderContext::for_candidate(candidate);
        let timeout = self
            .descriptor
            .request_timeout(self.settings.default_timeout_secs);
        let threshold = self.settings.confirmation_threshold;

        let mut confidence = 0.0;
        let mut last_status: Option<u16> = None;
        let mut last_proxy: Option<String> = None;
        let mut requests = 0;

        let report = |outcome: ProbeOutcome, confidence: f64, last_status, requests| ProbeReport {
            outcome,
            confidence,
            last_status,
            requests,
        };

        for endpoint in &self.descriptor.endpoints {
            let mut tries: u32 = 0;

            loop {
                tries += 1;

                let parts = match self.prepare(endpoint, &ctx) {
                    Ok(parts) => parts,
                    Err(failure) => {
                        warn!(
                            service = %self.descriptor.key(),
                            endpoint = %endpoint.name,
                            "signer failed, aborting check"
                        );
                        return report(ProbeOutcome::Error(failure), confidence, last_status, requests);
                    }
                };

                let proxy = proxies.and_then(|source| source.acquire());
                if let Some(proxy) = &proxy {
                    debug!(proxy = %proxy, "using proxy");
                }
                last_proxy.clone_from(&proxy);

                let request = HttpRequest {
                    method: endpoint.method.clone(),
                    url: ctx.render_str(&endpoint.url),
                    headers: parts.headers,
                    query: parts.query,
                    form: parts.body,
                    raw_body: parts.raw_body,
                    proxy,
                    timeout,
                };

                requests += 1;
                let response = match self.transport.send(&request) {
                    Ok(response) => response,
                    Err(e) => {
                        warn!(
                            service = %self.descriptor.key(),
                            endpoint = %endpoint.name,
                            error = %e,
                            "request failed"
                        );
                        if let (Some(source), Some(address)) = (proxies, last_proxy.as_deref()) {
                            source.report_error(address);
                        }
                        return report(
                            ProbeOutcome::Error(ProbeFailure::Transport(e)),
                            confidence,
                            last_status,
                            requests,
                        );
                    }
                };

                last_status = Some(response.status);
                let score = signals::evaluate(endpoint, &response);
                confidence += score;
                self.log_response(endpoint, response.status, score, confidence, &response.body);

                if confidence >= threshold {
                    return report(ProbeOutcome::Found, confidence, last_status, requests);
                }

                let transient = response.status == 429 || (500..600).contains(&response.status);
                if !(transient && tries <= endpoint.retry.max_retries) {
                    break;
                }

                debug!(
                    service = %self.descriptor.key(),
                    endpoint = %endpoint.name,
                    status = response.status,
                    attempt = tries,
                    "retrying transient response"
                );
                std::thread::sleep(endpoint.retry.backoff());
            }
        }

        let outcome = if confidence >= threshold {
            ProbeOutcome::Found
        } else if confidence > 0.0 {
            ProbeOutcome::Inconclusive
        } else if last_status == Some(429) {
            if let (Some(source), Some(address)) = (proxies, last_proxy.as_deref()) {
                source.report_rate_limit(address);
            }
            ProbeOutcome::RateLimited
        } else {
            ProbeOutcome::NotFound
        };

        report(outcome, confidence, last_status, requests)
    }

    fn prepare(&self, endpoint: &Endpoint, ctx: &RenderContext) -> Result<RequestParts, ProbeFailure> {
        let mut parts = RequestParts {
            headers: stringify(&ctx.render_map(&endpoint.headers)),
            query: stringify(&ctx.render_map(&endpoint.query)),
            body: stringify(&ctx.render_map(&endpoint.body)),
            raw_body: None,
        };

        if let Some(name) = &endpoint.signer {
            let signer = self.signers.get(name).map_err(ProbeFailure::Signer)?;
            signer
                .sign(&mut parts, ctx, &endpoint.signer_params)
                .map_err(ProbeFailure::Signer)?;
        }

        Ok(parts)
    }

    fn log_response(&self, endpoint: &Endpoint, status: u16, score: f64, confidence: f64, body: &str) {
        let preview: String = body
            .chars()
            .take(PREVIEW_CHARS)
            .map(|c| if c == '\n' { ' ' } else { c })
            .collect();

        if self.settings.debug_requests {
            info!(
                target: "tessera::requests",
                service = %self.descriptor.key(),
                endpoint = %endpoint.name,
                status,
                score_add = score,
                total_conf = confidence,
                preview = %preview,
                "descriptor response"
            );
        } else {
            info!(
                service = %self.descriptor.key(),
                endpoint = %endpoint.name,
                status,
                score_add = score,
                total_conf = confidence,
                preview = %preview,
                "descriptor response"
            );
        }
    }
}

fn stringify(map: &BTreeMap<String, serde_json::Value>) -> BTreeMap<String, String> {
    map.iter()
        .map(|(k, v)| (k.clone(), value_to_string(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SignerError, TransportError};
    use crate::transport::HttpResponse;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::time::Duration;

    struct Scripted {
        responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
        sent: Mutex<Vec<HttpRequest>>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<HttpResponse, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    impl HttpTransport for Scripted {
        fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.sent.lock().push(request.clone());
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(HttpResponse::new(404, "")))
        }
    }

    fn runtime(descriptor: serde_json::Value, transport: Arc<Scripted>) -> ProbeRuntime {
        runtime_with_signers(descriptor, transport, SignerRegistry::new())
    }

    fn runtime_with_signers(
        descriptor: serde_json::Value,
        transport: Arc<Scripted>,
        signers: SignerRegistry,
    ) -> ProbeRuntime {
        let descriptor = ServiceDescriptor::from_value(descriptor).expect("valid descriptor");
        ProbeRuntime::new(
            Arc::new(descriptor),
            transport,
            Arc::new(signers),
            ProbeSettings {
                default_timeout_secs: 5,
                confirmation_threshold: DEFAULT_CONFIRMATION_THRESHOLD,
                debug_requests: false,
            },
        )
    }

    #[test]
    fn test_two_endpoints_accumulate() {
        let transport = Scripted::new(vec![
            Ok(HttpResponse::new(200, r#"{"exists": true}"#)),
            Ok(HttpResponse::new(200, "registered")),
        ]);
        let rt = runtime(
            json!({
                "service_key": "twostep",
                "endpoints": [
                    {"name": "a", "url": "https://example.com/a",
                     "success_signals": [{"type": "json_path", "path": "$.exists", "equals": true, "weight": 0.6}]},
                    {"name": "b", "url": "https://example.com/b",
                     "success_signals": [{"type": "regex", "pattern": "registered", "weight": 0.4}]}
                ]
            }),
            Arc::clone(&transport),
        );

        let report = rt.check("+420731234567", None);
        assert_eq!(report.outcome, ProbeOutcome::Found);
        assert_eq!(report.requests, 2);
    }

    #[test]
    fn test_found_short_circuits_remaining_endpoints() {
        let transport = Scripted::new(vec![Ok(HttpResponse::new(200, ""))]);
        let rt = runtime(
            json!({
                "service_key": "short",
                "endpoints": [
                    {"url": "https://example.com/a",
                     "success_signals": [{"type": "status", "equals": 200, "weight": 1.0}]},
                    {"url": "https://example.com/never"}
                ]
            }),
            Arc::clone(&transport),
        );

        let report = rt.check("1", None);
        assert_eq!(report.outcome, ProbeOutcome::Found);
        assert_eq!(transport.sent.lock().len(), 1);
    }

    #[test]
    fn test_inconclusive_below_threshold() {
        let transport = Scripted::new(vec![Ok(HttpResponse::new(200, ""))]);
        let rt = runtime(
            json!({
                "service_key": "weak",
                "endpoints": [{"url": "https://example.com",
                    "success_signals": [{"type": "status", "equals": 200, "weight": 0.5}]}]
            }),
            transport,
        );
        let report = rt.check("1", None);
        assert_eq!(report.outcome, ProbeOutcome::Inconclusive);
        assert!((report.confidence - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_templates_rendered_into_request() {
        let transport = Scripted::new(vec![Ok(HttpResponse::new(404, ""))]);
        let rt = runtime(
            json!({
                "service_key": "render",
                "timeouts": {"request": 9},
                "endpoints": [{
                    "method": "post",
                    "url": "https://example.com/u/${phone}",
                    "headers": {"X-Phone": "${phone}"},
                    "query": {"q": "${phone}", "n": 3},
                    "body": {"phone": "${phone}"}
                }]
            }),
            Arc::clone(&transport),
        );

        rt.check("777", None);
        let sent = transport.sent.lock();
        let request = &sent[0];
        assert_eq!(request.method, "POST");
        assert_eq!(request.url, "https://example.com/u/777");
        assert_eq!(request.headers["X-Phone"], "777");
        assert_eq!(request.query["q"], "777");
        assert_eq!(request.query["n"], "3");
        assert_eq!(request.form["phone"], "777");
        assert_eq!(request.timeout, Duration::from_secs(9));
        assert!(request.proxy.is_none());
    }

    #[test]
    fn test_retry_on_server_error_then_success() {
        let transport = Scripted::new(vec![
            Ok(HttpResponse::new(503, "")),
            Ok(HttpResponse::new(200, "")),
        ]);
        let rt = runtime(
            json!({
                "service_key": "flaky",
                "endpoints": [{"url": "https://example.com",
                    "retry": {"max_retries": 1, "backoff_ms": 1},
                    "success_signals": [{"type": "status", "equals": 200, "weight": 1.0}]}]
            }),
            Arc::clone(&transport),
        );

        let report = rt.check("1", None);
        assert_eq!(report.outcome, ProbeOutcome::Found);
        assert_eq!(report.requests, 2);
    }

    #[test]
    fn test_transport_error_aborts_without_retry() {
        let transport = Scripted::new(vec![Err(TransportError::Connect("refused".into()))]);
        let rt = runtime(
            json!({
                "service_key": "down",
                "endpoints": [
                    {"url": "https://example.com/a", "retry": {"max_retries": 3, "backoff_ms": 1}},
                    {"url": "https://example.com/b"}
                ]
            }),
            Arc::clone(&transport),
        );

        let report = rt.check("1", None);
        assert_eq!(report.outcome.to_string(), "[ERROR]: Connection failed");
        assert_eq!(transport.sent.lock().len(), 1);
    }

    #[test]
    fn test_signer_applied_and_failure_aborts() {
        let signers = SignerRegistry::new()
            .with(
                "stamp",
                |parts: &mut RequestParts,
                 _ctx: &RenderContext,
                 params: &BTreeMap<String, String>|
                 -> Result<(), SignerError> {
                    parts
                        .headers
                        .insert("X-Sig".to_string(), params["key"].clone());
                    Ok(())
                },
            )
            .with(
                "broken",
                |_parts: &mut RequestParts,
                 _ctx: &RenderContext,
                 _params: &BTreeMap<String, String>|
                 -> Result<(), SignerError> {
                    Err(SignerError::Failed("missing secret".into()))
                },
            );

        let transport = Scripted::new(vec![Ok(HttpResponse::new(404, ""))]);
        let rt = runtime_with_signers(
            json!({
                "service_key": "signed",
                "endpoints": [
                    {"url": "https://example.com/a", "signer": "stamp", "signer_params": {"key": "abc"}},
                    {"url": "https://example.com/b", "signer": "broken"},
                    {"url": "https://example.com/c"}
                ]
            }),
            Arc::clone(&transport),
            signers,
        );

        let report = rt.check("1", None);
        assert_eq!(
            report.outcome.to_string(),
            "[ERROR]: Signer failed: missing secret"
        );
        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].headers["X-Sig"], "abc");
    }

    #[test]
    fn test_signer_raw_body_reaches_transport() {
        let signers = SignerRegistry::new().with(
            "encode",
            |parts: &mut RequestParts,
             ctx: &RenderContext,
             _params: &BTreeMap<String, String>|
             -> Result<(), SignerError> {
                let phone = ctx.get("phone").unwrap_or_default();
                parts.raw_body = Some(format!("signed_body=SIG.{phone}"));
                parts.body.clear();
                Ok(())
            },
        );

        let transport = Scripted::new(vec![Ok(HttpResponse::new(404, ""))]);
        let rt = runtime_with_signers(
            json!({
                "service_key": "rawbody",
                "endpoints": [{
                    "url": "https://example.com/lookup",
                    "method": "POST",
                    "body": {"phone": "${phone}"},
                    "signer": "encode"
                }]
            }),
            Arc::clone(&transport),
            signers,
        );

        rt.check("777", None);
        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].raw_body.as_deref(), Some("signed_body=SIG.777"));
        assert!(sent[0].form.is_empty());
    }

    #[test]
    fn test_unregistered_signer_is_error() {
        let transport = Scripted::new(vec![]);
        let rt = runtime(
            json!({
                "service_key": "nosigner",
                "endpoints": [{"url": "https://example.com", "signer": "ghost"}]
            }),
            Arc::clone(&transport),
        );
        let report = rt.check("1", None);
        assert_eq!(
            report.outcome.to_string(),
            "[ERROR]: Signer failed: signer not registered: ghost"
        );
        assert!(transport.sent.lock().is_empty());
    }
}
