//! Probe requests: the closed set of protocol requests workers execute.

use url::Url;
use vigil_core::{Header, HttpSpec};

/// Request-type identifier for HTTP probes, used as the registry key.
pub const HTTP_REQUEST_KIND: &str = "http_request";

/// A protocol request bound to one concrete endpoint.
///
/// Closed set of variants; the runner only builds variants for spec
/// types it decoded, so an unknown protocol never reaches a pool.
#[derive(Debug, Clone)]
pub enum ProbeRequest {
    Http(HttpRequest),
}

impl ProbeRequest {
    /// Registry key selecting the worker pool for this request.
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeRequest::Http(_) => HTTP_REQUEST_KIND,
        }
    }
}

/// One HTTP or WebSocket probe against one endpoint.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    /// Full URL including the endpoint address.
    pub url: String,
    /// Virtual host to present instead of the dial address. Empty
    /// means none.
    pub host: String,
    pub headers: Vec<Header>,
    pub body: String,
    pub insecure_skip_verify: bool,
}

impl HttpRequest {
    /// Bind a spec to a concrete endpoint address.
    pub fn from_spec(spec: &HttpSpec, address: &str) -> Self {
        let path = if spec.path.is_empty() || spec.path.starts_with('/') {
            spec.path.clone()
        } else {
            format!("/{}", spec.path)
        };
        Self {
            method: spec.verb.clone(),
            url: format!("{}://{}:{}{}", spec.protocol, address, spec.port, path),
            host: spec.host.clone(),
            headers: spec.headers.clone(),
            body: spec.body.clone(),
            insecure_skip_verify: spec.insecure_skip_verify,
        }
    }

    /// Whether this request takes the WebSocket path: a ws/wss URL
    /// scheme, or an "Upgrade: websocket" header.
    pub fn is_websocket(&self) -> bool {
        if let Ok(url) = Url::parse(&self.url) {
            if matches!(url.scheme(), "ws" | "wss") {
                return true;
            }
        }
        self.headers.iter().any(|h| {
            h.is("upgrade")
                && h.values
                    .iter()
                    .any(|v| v.eq_ignore_ascii_case("websocket"))
        })
    }

    /// The virtual host for this request: an explicit Host header wins
    /// over the spec-level host field.
    pub fn virtual_host(&self) -> Option<&str> {
        for header in &self.headers {
            if header.is("host") {
                if let Some(value) = header.first() {
                    if !value.is_empty() {
                        return Some(value);
                    }
                }
            }
        }
        if self.host.is_empty() {
            None
        } else {
            Some(&self.host)
        }
    }
}
