//! Wire-facing records published to external messaging consumers.

use crate::ids::{AgentId, CheckId};
use crate::response::{CheckResponse, Metric};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// The persisted/published shape of a finalized check response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub check_id: CheckId,
    pub check_name: String,
    pub target_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_address: Option<String>,
    /// HTTP status code; 0 when the probe produced no protocol result.
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub metrics: Vec<Metric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp_ms: i64,
}

impl From<CheckResponse> for ResponseRecord {
    fn from(cr: CheckResponse) -> Self {
        let (code, body, headers, metrics) = match cr.response.result {
            Some(r) => (r.code, r.body, r.headers, r.metrics),
            None => (0, String::new(), BTreeMap::new(), Vec::new()),
        };
        Self {
            check_id: cr.check_id,
            check_name: cr.check_name,
            target_id: cr.target.id,
            target_address: cr.target.address,
            code,
            body,
            headers,
            metrics,
            error: cr.response.error.map(|e| e.to_string()),
            timestamp_ms: Utc::now().timestamp_millis(),
        }
    }
}

/// Periodic liveness report for one agent process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatRecord {
    /// Name of the emitting process, e.g. "vigil-agent".
    pub process: String,
    pub agent_id: AgentId,
    #[serde(default)]
    pub customer_id: String,
    pub timestamp_ms: i64,
    /// Process-level gauges sampled at emit time.
    #[serde(default)]
    pub metrics: HashMap<String, f64>,
}

impl HeartbeatRecord {
    pub fn now(
        process: impl Into<String>,
        agent_id: AgentId,
        customer_id: impl Into<String>,
    ) -> Self {
        Self {
            process: process.into(),
            agent_id,
            customer_id: customer_id.into(),
            timestamp_ms: Utc::now().timestamp_millis(),
            metrics: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CheckError;
    use crate::response::{HttpResult, Response};
    use crate::target::{Target, TargetKind};

    fn sample_response(response: Response) -> CheckResponse {
        CheckResponse {
            check_id: CheckId::new("c1"),
            check_name: "api".to_owned(),
            target: Target::concrete(TargetKind::Ip, "ip-1", "192.0.2.1"),
            response,
        }
    }

    #[test]
    fn test_record_from_success() {
        let result = HttpResult {
            code: 200,
            body: "OK".to_owned(),
            headers: BTreeMap::new(),
            metrics: vec![Metric::new("request_latency_ms", 3.0)],
        };
        let record = ResponseRecord::from(sample_response(Response::ok(result)));
        assert_eq!(record.code, 200);
        assert_eq!(record.body, "OK");
        assert!(record.error.is_none());
        assert_eq!(record.target_address.as_deref(), Some("192.0.2.1"));
    }

    #[test]
    fn test_record_from_error_has_zero_code() {
        let response = Response::from_error(CheckError::Network("refused".to_owned()));
        let record = ResponseRecord::from(sample_response(response));
        assert_eq!(record.code, 0);
        assert_eq!(record.error.as_deref(), Some("Network error: refused"));
    }

    #[test]
    fn test_record_serializes_without_nulls() {
        let response = Response::from_error(CheckError::Cancelled("shutdown".to_owned()));
        let record = ResponseRecord::from(sample_response(response));
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"error\""));
        assert!(!json.contains("null"));
    }

    #[test]
    fn test_heartbeat_now() {
        let hb = HeartbeatRecord::now("vigil-agent", AgentId::new("a1"), "cust-1");
        assert_eq!(hb.process, "vigil-agent");
        assert!(hb.timestamp_ms > 0);
    }
}
