//! Periodic liveness reporting.

use crate::messaging::{Publisher, HEARTBEAT_TOPIC};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vigil_core::{AgentId, HeartbeatRecord};

/// Publish a heartbeat every `interval` until cancelled.
pub async fn run_heartbeat_loop(
    publisher: Arc<dyn Publisher>,
    agent_id: AgentId,
    customer_id: String,
    interval: Duration,
    cancel: CancellationToken,
) {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel.cancelled() => break,
        }

        let mut record = HeartbeatRecord::now("vigil-agent", agent_id.clone(), customer_id.clone());
        record
            .metrics
            .insert("uptime_secs".to_owned(), started.elapsed().as_secs_f64());

        match serde_json::to_value(&record) {
            Ok(value) => {
                if let Err(e) = publisher.publish(HEARTBEAT_TOPIC, value).await {
                    warn!(error = %e, "failed to publish heartbeat");
                } else {
                    debug!(agent_id = %agent_id, "heartbeat emitted");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize heartbeat"),
        }
    }

    info!("heartbeat loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::ChannelPublisher;

    #[tokio::test]
    async fn test_emits_heartbeats_until_cancelled() {
        let (publisher, mut rx) = ChannelPublisher::new(8);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_heartbeat_loop(
            Arc::new(publisher),
            AgentId::new("agent-1"),
            "cust-1".to_owned(),
            Duration::from_millis(10),
            cancel.clone(),
        ));

        let (topic, record) = rx.recv().await.unwrap();
        assert_eq!(topic, HEARTBEAT_TOPIC);
        assert_eq!(record["process"], "vigil-agent");
        assert_eq!(record["agent_id"], "agent-1");
        assert!(record["metrics"]["uptime_secs"].as_f64().is_some());

        cancel.cancel();
        handle.await.unwrap();
    }
}
