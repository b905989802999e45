//! The runner: resolve a check's target, fan out one task per
//! endpoint, and aggregate terminal responses into one output stream.

use crate::context::{RunContext, RunOptions};
use crate::pool::Registry;
use crate::request::{HttpRequest, ProbeRequest};
use crate::resolver::Resolver;
use crate::task::Task;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};
use vigil_core::{Check, CheckError, CheckResponse, CheckSpec, Response, Target};

/// Executes single check invocations against a resolver and a worker
/// registry. Cheap to clone and safe to share across concurrent runs.
#[derive(Clone)]
pub struct Runner {
    resolver: Arc<dyn Resolver>,
    registry: Arc<Registry>,
}

impl Runner {
    pub fn new(resolver: Arc<dyn Resolver>, registry: Arc<Registry>) -> Self {
        Self { resolver, registry }
    }

    /// Run one check across its resolved targets.
    ///
    /// Failures before any task is dispatched (an undecodable spec, a
    /// resolver error) fail the whole call. After dispatch begins,
    /// failures are per-target: the returned stream yields exactly one
    /// [`CheckResponse`] per dispatched target, in no particular
    /// order, and then closes. An empty resolution yields a stream
    /// that closes immediately.
    pub async fn run_check(
        &self,
        ctx: &RunContext,
        opts: &RunOptions,
        check: &Check,
    ) -> Result<ReceiverStream<CheckResponse>, CheckError> {
        let spec = CheckSpec::decode(&check.spec)?;
        let mut targets = self.resolver.resolve(&check.target).await?;

        if let Some(max_hosts) = opts.max_hosts {
            if targets.len() > max_hosts {
                debug!(
                    check_id = %check.id,
                    resolved = targets.len(),
                    max_hosts,
                    "capping fan-out"
                );
                targets.truncate(max_hosts);
            }
        }

        info!(
            check_id = %check.id,
            check_name = %check.name,
            targets = targets.len(),
            "dispatching check"
        );

        let (tx, rx) = mpsc::channel(targets.len().max(1));
        for target in targets {
            let prepared = prepare_task(&spec, &target);
            let tx = tx.clone();
            let ctx = ctx.clone();
            let registry = Arc::clone(&self.registry);
            let check_id = check.id.clone();
            let check_name = check.name.clone();
            tokio::spawn(async move {
                let response = match prepared {
                    Ok(task) => {
                        let completed = registry.submit(&ctx, task).await;
                        completed.response.unwrap_or_else(|| {
                            Response::from_error(CheckError::Protocol(
                                "worker returned no response".to_owned(),
                            ))
                        })
                    }
                    Err(error) => Response::from_error(error),
                };
                let _ = tx
                    .send(CheckResponse {
                        check_id,
                        check_name,
                        target,
                        response,
                    })
                    .await;
            });
        }
        // The stream observes closure once every spawned task has sent
        // its response and dropped its sender clone.
        drop(tx);
        Ok(ReceiverStream::new(rx))
    }
}

fn prepare_task(spec: &CheckSpec, target: &Target) -> Result<Task, CheckError> {
    let address = match target.address.as_deref() {
        Some(address) if !address.is_empty() => address,
        _ => {
            return Err(CheckError::InvalidTarget(format!(
                "target {} resolved without an address",
                target.id
            )))
        }
    };
    let request = match spec {
        CheckSpec::Http(http) => ProbeRequest::Http(HttpRequest::from_spec(http, address)),
    };
    Ok(Task::new(request))
}
