//! Messaging boundary for publishing results and heartbeats.
//!
//! The transport that carries records between processes is an external
//! collaborator; the agent only depends on the [`Publisher`] trait.
//! [`JsonLinePublisher`] writes one JSON line per record to stdout so
//! downstream collectors can consume the stream directly.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::io::{self, Write};
use thiserror::Error;
use tokio::sync::mpsc;

/// Topic for finalized check results.
pub const RESULTS_TOPIC: &str = "results";
/// Topic for agent liveness reports.
pub const HEARTBEAT_TOPIC: &str = "heartbeat";

/// Errors surfaced by publishers.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Subscriber went away")]
    Closed,
}

/// Publishes one record to a named topic.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, record: Value) -> Result<(), PublishError>;
}

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    topic: &'a str,
    timestamp: String,
    record: Value,
}

impl<'a> Envelope<'a> {
    fn new(topic: &'a str, record: Value) -> Self {
        Self {
            topic,
            timestamp: chrono::Utc::now().to_rfc3339(),
            record,
        }
    }
}

/// Publisher that emits each record as a JSON line on stdout.
pub struct JsonLinePublisher;

#[async_trait]
impl Publisher for JsonLinePublisher {
    async fn publish(&self, topic: &str, record: Value) -> Result<(), PublishError> {
        let line = serde_json::to_string(&Envelope::new(topic, record))?;
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{line}")?;
        stdout.flush()?;
        Ok(())
    }
}

/// Publisher that forwards records over a channel. Used in tests and
/// wherever an in-process consumer subscribes.
pub struct ChannelPublisher {
    tx: mpsc::Sender<(String, Value)>,
}

impl ChannelPublisher {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<(String, Value)>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Publisher for ChannelPublisher {
    async fn publish(&self, topic: &str, record: Value) -> Result<(), PublishError> {
        self.tx
            .send((topic.to_owned(), record))
            .await
            .map_err(|_| PublishError::Closed)
    }
}
