//! Fixed-size worker pool draining the intake queue.
//!
//! Workers retire after a bounded number of items so no single task lives
//! forever. The pool never respawns on its own: [`WorkerPool::maintain`]
//! reaps finished workers and tops the pool back up, and the supervisor loop
//! calls it once per tick.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::frame::WorkItem;
use crate::queue::IntakeQueue;

/// Processes one dequeued item end to end.
///
/// Errors are reported back to the pool for logging only; they never stop
/// the worker that returned them.
#[async_trait]
pub trait FrameHandler: Send + Sync + fmt::Debug {
    async fn handle(&self, item: WorkItem) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPoolSettings {
    pub workers: usize,
    pub max_tasks_per_worker: usize,
}

impl Default for WorkerPoolSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            max_tasks_per_worker: 10,
        }
    }
}

/// Why a worker task returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Reached `max_tasks_per_worker`.
    Exhausted { processed: usize },
    Cancelled { processed: usize },
    /// Every producer handle is gone and the queue is empty.
    QueueClosed { processed: usize },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub reaped: usize,
    pub spawned: usize,
}

struct Worker {
    id: Uuid,
    handle: JoinHandle<WorkerExit>,
}

pub struct WorkerPool {
    queue: IntakeQueue,
    handler: Arc<dyn FrameHandler>,
    settings: WorkerPoolSettings,
    workers: Vec<Worker>,
    shutdown_token: CancellationToken,
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("settings", &self.settings)
            .field("live_workers", &self.workers.len())
            .field("queue", &self.queue)
            .field("handler", &self.handler)
            .field("shutdown_cancelled", &self.shutdown_token.is_cancelled())
            .finish()
    }
}

impl WorkerPool {
    pub fn new(
        queue: IntakeQueue,
        handler: Arc<dyn FrameHandler>,
        mut settings: WorkerPoolSettings,
    ) -> Self {
        settings.workers = settings.workers.max(1);
        settings.max_tasks_per_worker = settings.max_tasks_per_worker.max(1);
        Self {
            queue,
            handler,
            settings,
            workers: Vec::with_capacity(settings.workers),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Spawn the initial set of workers.
    pub fn start(&mut self) -> usize {
        let spawned = self.fill();
        info!(
            workers = spawned,
            max_tasks_per_worker = self.settings.max_tasks_per_worker,
            queue_capacity = self.queue.capacity(),
            "worker pool started"
        );
        spawned
    }

    pub fn settings(&self) -> WorkerPoolSettings {
        self.settings
    }

    /// Number of workers whose task has not yet returned.
    pub fn live_count(&self) -> usize {
        self.workers
            .iter()
            .filter(|worker| !worker.handle.is_finished())
            .count()
    }

    /// Reap finished workers and spawn replacements up to the target size.
    pub fn maintain(&mut self) -> MaintenanceReport {
        let mut reaped = 0;
        let mut live = Vec::with_capacity(self.workers.len());
        for mut worker in self.workers.drain(..) {
            if !worker.handle.is_finished() {
                live.push(worker);
                continue;
            }
            reaped += 1;
            match (&mut worker.handle).now_or_never() {
                Some(result) => log_exit(worker.id, result),
                None => debug!(worker = %worker.id, "worker finished without a result"),
            }
        }
        self.workers = live;

        let spawned = self.fill();
        MaintenanceReport { reaped, spawned }
    }

    /// Cancel every worker and wait up to `grace` in total for them to
    /// return. Workers still running at the deadline are aborted.
    pub async fn shutdown(&mut self, grace: Duration) {
        info!(workers = self.workers.len(), ?grace, "stopping worker pool");
        self.shutdown_token.cancel();

        let deadline = Instant::now() + grace;
        for mut worker in self.workers.drain(..) {
            match tokio::time::timeout_at(deadline, &mut worker.handle).await {
                Ok(result) => log_exit(worker.id, result),
                Err(_) => {
                    warn!(worker = %worker.id, "worker did not stop in time; aborting");
                    worker.handle.abort();
                }
            }
        }
        info!("worker pool stopped");
    }

    fn fill(&mut self) -> usize {
        if self.shutdown_token.is_cancelled() {
            return 0;
        }
        let missing = self.settings.workers.saturating_sub(self.workers.len());
        for _ in 0..missing {
            let id = Uuid::new_v4();
            let handle = tokio::spawn(run_worker(
                id,
                self.queue.clone(),
                Arc::clone(&self.handler),
                self.settings.max_tasks_per_worker,
                self.shutdown_token.clone(),
            ));
            debug!(worker = %id, "spawned worker");
            self.workers.push(Worker { id, handle });
        }
        missing
    }
}

async fn run_worker(
    id: Uuid,
    queue: IntakeQueue,
    handler: Arc<dyn FrameHandler>,
    max_tasks: usize,
    shutdown: CancellationToken,
) -> WorkerExit {
    let mut processed = 0;
    while processed < max_tasks {
        let item = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                return WorkerExit::Cancelled { processed };
            }
            item = queue.get() => item,
        };
        let Some(item) = item else {
            return WorkerExit::QueueClosed { processed };
        };

        let path = item.path().to_path_buf();
        if let Err(err) = handler.handle(item).await {
            error!(worker = %id, path = %path.display(), error = %err, "frame processing failed");
        }
        processed += 1;
    }
    WorkerExit::Exhausted { processed }
}

fn log_exit(id: Uuid, result: std::result::Result<WorkerExit, JoinError>) {
    match result {
        Ok(WorkerExit::Exhausted { processed }) => {
            debug!(worker = %id, processed, "worker exhausted its task budget");
        }
        Ok(WorkerExit::Cancelled { processed }) => {
            debug!(worker = %id, processed, "worker cancelled");
        }
        Ok(WorkerExit::QueueClosed { processed }) => {
            info!(worker = %id, processed, "worker stopped: intake queue closed");
        }
        Err(err) if err.is_cancelled() => {
            debug!(worker = %id, "worker task aborted");
        }
        Err(err) => {
            error!(worker = %id, error = %err, "worker task panicked");
        }
    }
}
