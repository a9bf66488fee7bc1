use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::health::{HealthMonitor, Liveness};
use crate::pool::WorkerPool;

/// Why [`Supervisor::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The shutdown future resolved (Ctrl-C in the binary).
    Interrupted,
    /// No file events arrived within the stale threshold.
    Stale { idle: Duration },
}

impl ExitReason {
    /// Process exit status for this outcome.
    pub fn exit_code(self) -> i32 {
        match self {
            ExitReason::Interrupted => 0,
            ExitReason::Stale { .. } => 1,
        }
    }
}

/// The main control loop: once per tick, top up the worker pool and check
/// event-source liveness.
#[derive(Debug)]
pub struct Supervisor {
    pool: WorkerPool,
    monitor: HealthMonitor,
    tick: Duration,
}

impl Supervisor {
    pub fn new(pool: WorkerPool, monitor: HealthMonitor) -> Self {
        Self {
            pool,
            monitor,
            tick: Duration::from_secs(1),
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Run until `shutdown` resolves or the event source goes stale.
    pub async fn run<F>(&mut self, shutdown: F) -> ExitReason
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    return ExitReason::Interrupted;
                }
                _ = ticker.tick() => {
                    let report = self.pool.maintain();
                    if report.spawned > 0 {
                        debug!(reaped = report.reaped, spawned = report.spawned, "respawned workers");
                    }
                    if let Liveness::Stale { idle } = self.monitor.check() {
                        return ExitReason::Stale { idle };
                    }
                }
            }
        }
    }

    /// Consume the supervisor and stop the pool.
    pub async fn shutdown(mut self, grace: Duration) {
        self.pool.shutdown(grace).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::error::Result;
    use crate::frame::WorkItem;
    use crate::health::{HealthSettings, HealthState};
    use crate::pool::{FrameHandler, WorkerPoolSettings};
    use crate::queue::IntakeQueue;

    #[derive(Debug)]
    struct Noop;

    #[async_trait]
    impl FrameHandler for Noop {
        async fn handle(&self, _item: WorkItem) -> Result<()> {
            Ok(())
        }
    }

    fn supervisor(health: Arc<HealthState>) -> Supervisor {
        let pool = WorkerPool::new(
            IntakeQueue::new(2),
            Arc::new(Noop),
            WorkerPoolSettings {
                workers: 1,
                max_tasks_per_worker: 10,
            },
        );
        let monitor = HealthMonitor::new(
            health,
            HealthSettings {
                stale_threshold: Duration::from_secs(60),
            },
        );
        Supervisor::new(pool, monitor)
    }

    #[tokio::test(start_paused = true)]
    async fn exits_after_sixty_one_silent_seconds() {
        let started = tokio::time::Instant::now();
        let mut supervisor = supervisor(Arc::new(HealthState::new()));

        let reason = supervisor.run(std::future::pending()).await;

        assert_eq!(
            reason,
            ExitReason::Stale {
                idle: Duration::from_secs(61)
            }
        );
        assert_eq!(reason.exit_code(), 1);
        assert_eq!(started.elapsed(), Duration::from_secs(61));
        supervisor.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn regular_events_keep_it_running_until_interrupted() {
        let health = Arc::new(HealthState::new());
        let toucher = {
            let health = health.clone();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    health.touch();
                }
            })
        };
        let mut supervisor = supervisor(health);

        let reason = supervisor
            .run(tokio::time::sleep(Duration::from_secs(300)))
            .await;

        assert_eq!(reason, ExitReason::Interrupted);
        assert_eq!(reason.exit_code(), 0);
        toucher.abort();
        supervisor.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_starts_the_pool() {
        let mut supervisor = supervisor(Arc::new(HealthState::new()));
        assert_eq!(supervisor.pool().live_count(), 0);

        let reason = supervisor
            .run(tokio::time::sleep(Duration::from_millis(1500)))
            .await;

        assert_eq!(reason, ExitReason::Interrupted);
        assert_eq!(supervisor.pool().live_count(), 1);
        supervisor.shutdown(Duration::from_secs(1)).await;
    }
}
