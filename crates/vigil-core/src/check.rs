//! Check definitions and their protocol-specific spec payloads.

use crate::error::CheckError;
use crate::header::Header;
use crate::ids::CheckId;
use crate::target::Target;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named probe definition bound to a logical target.
///
/// The spec payload stays undecoded until dispatch so that checks for
/// protocols this process does not handle can still be carried and
/// republished verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub id: CheckId,
    pub name: String,
    /// Scheduling interval in seconds. Informational only; this engine
    /// executes single invocations.
    #[serde(default)]
    pub interval_secs: u32,
    pub target: Target,
    /// Type-tagged spec payload, decoded via [`CheckSpec::decode`].
    pub spec: Value,
    #[serde(default)]
    pub assertions: Vec<Assertion>,
}

/// A protocol-specific check specification.
///
/// The set of variants is closed: unknown type tags are a decode error,
/// never a best-effort interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CheckSpec {
    Http(HttpSpec),
}

impl CheckSpec {
    /// Request-type identifier used for worker-pool dispatch.
    pub fn request_kind(&self) -> &'static str {
        match self {
            CheckSpec::Http(_) => "http_request",
        }
    }

    /// Decode a raw spec payload into a registered spec type.
    pub fn decode(raw: &Value) -> Result<Self, CheckError> {
        serde_json::from_value(raw.clone())
            .map_err(|e| CheckError::SpecDecode(e.to_string()))
    }
}

fn default_verb() -> String {
    "GET".to_owned()
}

/// Specification of an HTTP (or WebSocket) probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpSpec {
    /// URL scheme: "http", "https", "ws", or "wss".
    pub protocol: String,
    /// Virtual host presented to the endpoint. Empty means the dial
    /// address is used as-is.
    #[serde(default)]
    pub host: String,
    pub port: u16,
    #[serde(default = "default_verb")]
    pub verb: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

/// A predicate over a check response, evaluated by external consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    /// What to inspect: "code", "body", "header", "metric".
    pub key: String,
    /// Optional qualifier for keyed subjects, e.g. a header name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Comparison: "equals", "notEquals", "contains", ...
    pub relationship: String,
    #[serde(default)]
    pub operand: String,
}
