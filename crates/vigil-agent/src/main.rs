//! Vigil Agent Daemon
//!
//! Loads checks from disk, runs each one once through the execution
//! engine, and publishes results and heartbeats through the messaging
//! boundary.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use vigil_checker::request::HTTP_REQUEST_KIND;
use vigil_checker::{HttpWorker, Registry, RunContext, RunOptions, Runner, StaticResolver};
use vigil_core::{AgentId, Check, ResponseRecord, Target};

mod config;
mod heart;
mod messaging;

use config::Config;
use messaging::{JsonLinePublisher, Publisher, RESULTS_TOPIC};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let agent_id = AgentId::generate();

    info!(
        agent_id = %agent_id,
        checks = %config.checks.display(),
        "Starting Vigil agent"
    );

    let mut registry = Registry::new();
    registry.register(
        HTTP_REQUEST_KIND,
        Box::new(|| Box::new(HttpWorker::new())),
        config.max_checks,
    );

    let mut resolver = StaticResolver::new();
    if let Some(path) = &config.targets {
        let raw = std::fs::read_to_string(path)?;
        let entries: HashMap<String, Vec<Target>> = serde_json::from_str(&raw)?;
        info!(entries = entries.len(), "Loaded target inventory");
        for (id, targets) in entries {
            resolver.insert(id, targets);
        }
    }
    let runner = Runner::new(Arc::new(resolver), Arc::new(registry));

    let publisher: Arc<dyn Publisher> = Arc::new(JsonLinePublisher);
    let cancel = CancellationToken::new();
    let heartbeat = tokio::spawn(heart::run_heartbeat_loop(
        Arc::clone(&publisher),
        agent_id.clone(),
        config.customer_id.clone(),
        Duration::from_secs(config.heartbeat_secs),
        cancel.clone(),
    ));

    let raw = std::fs::read_to_string(&config.checks)?;
    let checks: Vec<Check> = serde_json::from_str(&raw)?;
    info!(count = checks.len(), "Loaded checks");

    let opts = RunOptions {
        max_hosts: config.max_hosts,
    };
    for check in checks {
        let ctx = RunContext::with_timeout(Duration::from_secs(config.timeout_secs));
        match runner.run_check(&ctx, &opts, &check).await {
            Ok(mut stream) => {
                while let Some(check_response) = stream.next().await {
                    let record = ResponseRecord::from(check_response);
                    match serde_json::to_value(&record) {
                        Ok(value) => {
                            if let Err(e) = publisher.publish(RESULTS_TOPIC, value).await {
                                error!(error = %e, "Failed to publish result");
                            }
                        }
                        Err(e) => error!(error = %e, "Failed to serialize result"),
                    }
                }
            }
            Err(e) => {
                error!(check_id = %check.id, error = %e, "Check failed before dispatch");
            }
        }
    }

    cancel.cancel();
    let _ = heartbeat.await;
    info!("All checks executed; shutting down");
    Ok(())
}
