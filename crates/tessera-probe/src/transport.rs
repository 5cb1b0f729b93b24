//! HTTP transport seam and the `reqwest` implementation.
//!
//! The runtime talks to the network only through [`HttpTransport`], so tests
//! can replay scripted responses without sockets.

use crate::error::{ProbeError, Result, TransportError};
use parking_lot::Mutex;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::debug;

/// Browser-like user agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// One fully rendered HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Uppercased HTTP method
    pub method: String,
    /// Target URL
    pub url: String,
    /// Request headers
    pub headers: BTreeMap<String, String>,
    /// Query parameters
    pub query: BTreeMap<String, String>,
    /// Form-encoded body fields
    pub form: BTreeMap<String, String>,
    /// Pre-encoded body, sent instead of `form` when present
    pub raw_body: Option<String>,
    /// Proxy URL, or `None` to go direct
    pub proxy: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

/// A received HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Body text
    pub body: String,
}

impl HttpResponse {
    /// Create a response.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Something that can send an [`HttpRequest`].
pub trait HttpTransport: Send + Sync {
    /// Send the request and wait for the response.
    fn send(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError>;
}

/// Blocking `reqwest` transport with one client per proxy.
pub struct ReqwestTransport {
    default_headers: HeaderMap,
    direct: Client,
    proxied: Mutex<HashMap<String, Client>>,
}

impl ReqwestTransport {
    /// Create a transport sending `user_agent` plus browser-like defaults.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(user_agent: &str) -> Result<Self> {
        let default_headers = default_headers(user_agent)?;
        let direct = build_client(&default_headers, None)
            .map_err(|e| ProbeError::ClientBuild(e.to_string()))?;

        Ok(Self {
            default_headers,
            direct,
            proxied: Mutex::new(HashMap::new()),
        })
    }

    fn client_for(&self, proxy: Option<&str>) -> std::result::Result<Client, TransportError> {
        let Some(proxy) = proxy else {
            return Ok(self.direct.clone());
        };

        let mut clients = self.proxied.lock();
        if let Some(client) = clients.get(proxy) {
            return Ok(client.clone());
        }

        let client = build_client(&self.default_headers, Some(proxy))?;
        clients.insert(proxy.to_string(), client.clone());
        debug!(proxy = %proxy, "created proxied HTTP client");
        Ok(client)
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        let client = self.client_for(request.proxy.as_deref())?;

        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| TransportError::Other(format!("invalid method {}: {e}", request.method)))?;

        let mut builder = client
            .request(method, &request.url)
            .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(raw) = &request.raw_body {
            builder = builder.body(raw.clone());
        } else if !request.form.is_empty() {
            builder = builder.form(&request.form);
        }

        let response = builder
            .send()
            .map_err(|e| classify(&e, request.proxy.is_some()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| classify(&e, request.proxy.is_some()))?;

        Ok(HttpResponse { status, body })
    }
}

fn default_headers(user_agent: &str) -> Result<HeaderMap> {
    let pairs = [
        ("user-agent", user_agent),
        ("accept", "application/json, text/plain, */*"),
        ("accept-language", "en-US,en;q=0.9"),
        ("dnt", "1"),
        ("sec-fetch-dest", "empty"),
        ("sec-fetch-mode", "cors"),
        ("sec-fetch-site", "same-origin"),
    ];

    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let value = HeaderValue::from_str(value)
            .map_err(|e| ProbeError::ClientBuild(format!("invalid header {name}: {e}")))?;
        headers.insert(HeaderName::from_static(name), value);
    }
    Ok(headers)
}

fn build_client(
    headers: &HeaderMap,
    proxy: Option<&str>,
) -> std::result::Result<Client, TransportError> {
    let mut builder = Client::builder().default_headers(headers.clone());

    if let Some(proxy) = proxy {
        let proxy = reqwest::Proxy::all(proxy).map_err(|e| TransportError::Proxy(e.to_string()))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| TransportError::Other(format!("failed to create HTTP client: {e}")))
}

fn classify(error: &reqwest::Error, proxied: bool) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() && proxied {
        TransportError::Proxy(error.to_string())
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}
