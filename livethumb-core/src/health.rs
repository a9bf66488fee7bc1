//! Event-source liveness tracking.
//!
//! The watcher can stop delivering events without reporting an error. The
//! only recovery is a full restart, so the supervisor exits once no event
//! has been seen for longer than the stale threshold.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

/// Last-event time, shared between the watcher thread and the supervisor.
///
/// Stored as milliseconds since `start` in a single atomic that only ever
/// moves forward.
#[derive(Debug)]
pub struct HealthState {
    start: Instant,
    last_event_ms: AtomicU64,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// A fresh state counts as having just seen an event.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            last_event_ms: AtomicU64::new(0),
        }
    }

    pub fn touch(&self) {
        let now = self.elapsed_ms();
        self.last_event_ms.fetch_max(now, Ordering::AcqRel);
    }

    /// Time since the last recorded event.
    pub fn idle(&self) -> Duration {
        let last = self.last_event_ms.load(Ordering::Acquire);
        Duration::from_millis(self.elapsed_ms().saturating_sub(last))
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthSettings {
    pub stale_threshold: Duration,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            stale_threshold: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive { idle: Duration },
    Stale { idle: Duration },
}

#[derive(Debug, Clone)]
pub struct HealthMonitor {
    state: Arc<HealthState>,
    settings: HealthSettings,
}

impl HealthMonitor {
    pub fn new(state: Arc<HealthState>, settings: HealthSettings) -> Self {
        Self { state, settings }
    }

    pub fn state(&self) -> &Arc<HealthState> {
        &self.state
    }

    pub fn check(&self) -> Liveness {
        let idle = self.state.idle();
        if idle > self.settings.stale_threshold {
            warn!(
                idle_secs = idle.as_secs(),
                threshold_secs = self.settings.stale_threshold.as_secs(),
                "no file events received within the stale threshold"
            );
            Liveness::Stale { idle }
        } else {
            Liveness::Alive { idle }
        }
    }
}
