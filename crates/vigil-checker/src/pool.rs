//! Bounded worker pools and the request-type recruitment registry.
//!
//! Each request type gets a pool of at most `max_handlers` workers.
//! Idle workers sit in a channel; acquiring one blocks when the pool
//! is saturated, which is the engine's only admission control. A
//! worker is returned to the channel after every task, so no worker
//! is ever held by two submissions at once.

use crate::context::RunContext;
use crate::task::Task;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};
use vigil_core::{CheckError, Response};

/// Executes one task to completion.
///
/// Implementations must always return the task with a terminal
/// response recorded, whatever the outcome.
#[async_trait]
pub trait Worker: Send {
    async fn work(&mut self, ctx: &RunContext, task: Task) -> Task;
}

/// Constructor for a pool's workers, invoked `max_handlers` times at
/// registration.
pub type WorkerFactory = Box<dyn Fn() -> Box<dyn Worker> + Send + Sync>;

/// A fixed-size set of workers for one request type.
pub struct WorkerPool {
    idle_tx: mpsc::Sender<Box<dyn Worker>>,
    idle_rx: Mutex<mpsc::Receiver<Box<dyn Worker>>>,
}

impl WorkerPool {
    /// Build a pool holding `max_handlers` workers from the factory.
    pub fn new(factory: &WorkerFactory, max_handlers: usize) -> Self {
        let capacity = max_handlers.max(1);
        let (idle_tx, idle_rx) = mpsc::channel(capacity);
        for _ in 0..capacity {
            // Capacity equals the worker count, so this cannot fail.
            let _ = idle_tx.try_send(factory());
        }
        Self {
            idle_tx,
            idle_rx: Mutex::new(idle_rx),
        }
    }

    /// Take an idle worker, waiting if all are busy.
    pub async fn acquire(&self) -> Option<Box<dyn Worker>> {
        self.idle_rx.lock().await.recv().await
    }

    /// Return a worker to the idle set.
    pub async fn release(&self, worker: Box<dyn Worker>) {
        // The pool owns the receiver, so the channel is never closed.
        let _ = self.idle_tx.send(worker).await;
    }
}

/// Registry from request-type identifier to worker pool.
///
/// Built once at process startup and shared by reference; the runner
/// never hardcodes protocol dispatch beyond this lookup.
#[derive(Default)]
pub struct Registry {
    pools: HashMap<String, WorkerPool>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pool of `max_handlers` workers for a request type.
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        factory: WorkerFactory,
        max_handlers: usize,
    ) {
        let kind = kind.into();
        debug!(kind = %kind, max_handlers, "registering worker pool");
        self.pools.insert(kind, WorkerPool::new(&factory, max_handlers));
    }

    /// Dispatch one task and block until it carries a terminal
    /// response.
    ///
    /// An unregistered request type, a context that ends while waiting
    /// for a worker, and a context that ends mid-execution all produce
    /// a per-task error response rather than a panic or a hang.
    pub async fn submit(&self, ctx: &RunContext, mut task: Task) -> Task {
        let kind = task.request.kind();
        let pool = match self.pools.get(kind) {
            Some(pool) => pool,
            None => {
                warn!(kind, "no worker pool registered for request type");
                task.complete(Response::from_error(CheckError::DispatchType(
                    kind.to_owned(),
                )));
                return task;
            }
        };

        if ctx.is_done() {
            task.complete(Response::from_error(ctx.cause()));
            return task;
        }

        let mut worker = tokio::select! {
            worker = pool.acquire() => match worker {
                Some(worker) => worker,
                None => {
                    task.complete(Response::from_error(CheckError::DispatchType(
                        format!("worker pool for {kind} is closed"),
                    )));
                    return task;
                }
            },
            _ = ctx.done() => {
                task.complete(Response::from_error(ctx.cause()));
                return task;
            }
        };

        task.dispatched();
        // The worker gets its own copy so the cancellation arm can
        // still produce the terminal response if it wins the race.
        let completed = tokio::select! {
            completed = worker.work(ctx, task.clone()) => completed,
            _ = ctx.done() => {
                task.complete(Response::from_error(ctx.cause()));
                task
            }
        };
        pool.release(worker).await;
        completed
    }
}
