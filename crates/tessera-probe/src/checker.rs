//! Checking one candidate against several services.

use crate::error::Result;
use crate::runtime::{ProbeRuntime, ProbeSettings};
use crate::signer::SignerRegistry;
use crate::transport::HttpTransport;
use std::sync::Arc;
use tessera_core::{CheckResult, ServiceKey};
use tessera_descriptor::DescriptorRegistry;
use tessera_proxy::ProxySource;
use tracing::debug;

/// One runtime per enabled service, checked in order.
pub struct ServiceChecker {
    runtimes: Vec<ProbeRuntime>,
}

impl ServiceChecker {
    /// Build runtimes for `services`, which must all be registered.
    ///
    /// # Errors
    /// Returns error if a service key is not in the registry.
    pub fn new(
        registry: &DescriptorRegistry,
        services: &[ServiceKey],
        transport: &Arc<dyn HttpTransport>,
        signers: &Arc<SignerRegistry>,
        settings: &ProbeSettings,
    ) -> Result<Self> {
        let runtimes = services
            .iter()
            .map(|key| {
                let descriptor = registry.get(key.as_str())?;
                Ok(ProbeRuntime::new(
                    descriptor,
                    Arc::clone(transport),
                    Arc::clone(signers),
                    settings.clone(),
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { runtimes })
    }

    /// Create a checker from prepared runtimes.
    #[must_use]
    pub fn from_runtimes(runtimes: Vec<ProbeRuntime>) -> Self {
        Self { runtimes }
    }

    /// Display names of the enabled services, in check order.
    #[must_use]
    pub fn service_names(&self) -> Vec<&str> {
        self.runtimes.iter().map(ProbeRuntime::service_name).collect()
    }

    /// Number of enabled services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runtimes.len()
    }

    /// Whether no services are enabled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runtimes.is_empty()
    }

    /// Check `candidate` against every enabled service.
    ///
    /// Each result is keyed by the service's display name.
    #[must_use]
    pub fn check(&self, candidate: &str, proxies: Option<&dyn ProxySource>) -> Vec<CheckResult> {
        self.runtimes
            .iter()
            .map(|runtime| {
                let report = runtime.check(candidate, proxies);
                let mut result = CheckResult::from_legacy(
                    runtime.service_name(),
                    candidate,
                    &report.outcome.to_string(),
                );
                result
                    .details
                    .insert("confidence".to_string(), report.confidence.into());
                debug!(
                    service = %runtime.service_name(),
                    status = %result.status,
                    requests = report.requests,
                    "service checked"
                );
                result
            })
            .collect()
    }
}

impl std::fmt::Debug for ServiceChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceChecker")
            .field("services", &self.service_names())
            .finish()
    }
}
