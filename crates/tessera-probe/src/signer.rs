//! Request signing hooks.
//!
//! Endpoints name a signer; the names are resolved against a
//! [`SignerRegistry`] built once at startup and injected into the runtime.

use crate::error::SignerError;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tessera_descriptor::RenderContext;

/// The mutable parts of a rendered request handed to a signer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParts {
    /// Request headers
    pub headers: BTreeMap<String, String>,
    /// Query parameters
    pub query: BTreeMap<String, String>,
    /// Form body fields
    pub body: BTreeMap<String, String>,
    /// Pre-encoded body; when set it is sent as-is instead of `body`
    pub raw_body: Option<String>,
}

/// A hook that mutates a request before it is sent.
pub trait Signer: Send + Sync {
    /// Sign `parts` in place.
    ///
    /// # Errors
    /// Any error aborts the whole check.
    fn sign(
        &self,
        parts: &mut RequestParts,
        ctx: &RenderContext,
        params: &BTreeMap<String, String>,
    ) -> Result<(), SignerError>;
}

impl<F> Signer for F
where
    F: Fn(&mut RequestParts, &RenderContext, &BTreeMap<String, String>) -> Result<(), SignerError>
        + Send
        + Sync,
{
    fn sign(
        &self,
        parts: &mut RequestParts,
        ctx: &RenderContext,
        params: &BTreeMap<String, String>,
    ) -> Result<(), SignerError> {
        self(parts, ctx, params)
    }
}

/// Name → signer lookup table.
#[derive(Clone, Default)]
pub struct SignerRegistry {
    signers: HashMap<String, Arc<dyn Signer>>,
}

impl SignerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a signer under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, signer: impl Signer + 'static) {
        self.signers.insert(name.into(), Arc::new(signer));
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, signer: impl Signer + 'static) -> Self {
        self.register(name, signer);
        self
    }

    /// Look up a signer.
    ///
    /// # Errors
    /// Returns [`SignerError::NotRegistered`] for unknown names.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Signer>, SignerError> {
        self.signers
            .get(name)
            .cloned()
            .ok_or_else(|| SignerError::NotRegistered(name.to_string()))
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.signers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for SignerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerRegistry")
            .field("signers", &self.names())
            .finish()
    }
}
