//! Responses produced by executing a check against its resolved targets.

use crate::error::CheckError;
use crate::ids::CheckId;
use crate::target::Target;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A named numeric measurement taken during probe execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
}

impl Metric {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            tags: None,
        }
    }
}

/// The protocol-level outcome of one HTTP or WebSocket probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResult {
    pub code: u16,
    /// Response body, capped at the engine's maximum content length.
    pub body: String,
    /// Header name to values. Ordered map so emitted records are stable.
    pub headers: BTreeMap<String, Vec<String>>,
    pub metrics: Vec<Metric>,
}

/// The terminal outcome of one task.
///
/// An error can accompany a partial result, so the two fields are not
/// an either-or. A response with neither set is never produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Response {
    pub result: Option<HttpResult>,
    pub error: Option<CheckError>,
}

impl Response {
    /// A successful response carrying a protocol result.
    pub fn ok(result: HttpResult) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    /// A terminal error response with no protocol result.
    pub fn from_error(error: CheckError) -> Self {
        Self {
            result: None,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// The caller-visible result for one (check, target) pair.
///
/// Carries the originating identity so multi-target results can be
/// correlated without relying on arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResponse {
    pub check_id: CheckId,
    pub check_name: String,
    pub target: Target,
    pub response: Response,
}
