use std::fmt;

use crate::models::{
    Config, DEFAULT_HTTP_TIMEOUT, DEFAULT_POLL_INTERVAL, DEFAULT_REDIS_TIMEOUT,
    DEFAULT_REDIS_TTL, DEFAULT_STALE_THRESHOLD,
};

/// A non-fatal configuration problem that was corrected automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.hint {
            Some(hint) => write!(f, "{} ({hint})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigWarnings {
    items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push(&mut self, message: impl Into<String>) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint(
        &mut self,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }

    /// Whether any warning message contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.items.iter().any(|w| w.message.contains(needle))
    }
}

/// Coerce zero and inconsistent values into something runnable, recording
/// a warning for each change.
pub fn apply_guard_rails(
    config: &mut Config,
    default_workers: usize,
) -> ConfigWarnings {
    let mut warnings = ConfigWarnings::default();

    if config.workers.count == 0 {
        config.workers.count = default_workers.max(1);
        warnings.push_with_hint(
            format!("WORKERS=0 is not usable; using {}", config.workers.count),
            "unset WORKERS to size the pool from available parallelism",
        );
    }
    if config.workers.queue_max_size == 0 {
        config.workers.queue_max_size = config.workers.count * 2;
        warnings.push(format!(
            "EVENT_QUEUE_MAX_SIZE=0 would block every event; using {}",
            config.workers.queue_max_size
        ));
    }
    if config.workers.max_tasks_per_worker == 0 {
        config.workers.max_tasks_per_worker = 1;
        warnings.push("MAX_TASKS_PER_WORKER=0 raised to 1");
    }

    if config.redis.sample_rate == 0 {
        config.redis.sample_rate = 1;
        warnings.push_with_hint(
            "REDIS_SAMPLE_RATE=0 raised to 1; every frame will be cached",
            "set REDIS_SAMPLE_RATE=N to keep one frame in N",
        );
    }
    if config.redis.ttl.is_zero() {
        config.redis.ttl = DEFAULT_REDIS_TTL;
        warnings.push(format!(
            "REDIS_TTL=0 would expire frames immediately; using {}s",
            DEFAULT_REDIS_TTL.as_secs()
        ));
    }

    for (key, value, default) in [
        ("HTTP_TIMEOUT", &mut config.http.timeout, DEFAULT_HTTP_TIMEOUT),
        ("REDIS_TIMEOUT", &mut config.redis.timeout, DEFAULT_REDIS_TIMEOUT),
        (
            "WATCH_POLL_INTERVAL",
            &mut config.watch.poll_interval,
            DEFAULT_POLL_INTERVAL,
        ),
        (
            "EVENT_STALE_THRESHOLD",
            &mut config.watch.stale_threshold,
            DEFAULT_STALE_THRESHOLD,
        ),
    ] {
        if value.is_zero() {
            *value = default;
            warnings.push(format!(
                "{key}=0 is not usable; using {}",
                humantime::format_duration(default)
            ));
        }
    }

    if config.watch.stale_threshold <= config.watch.poll_interval {
        warnings.push_with_hint(
            "EVENT_STALE_THRESHOLD is not longer than WATCH_POLL_INTERVAL",
            "the watchdog may restart the process between polls",
        );
    }

    if config.http.hosts.is_empty() {
        warnings.push("no HTTP hosts configured; HTTP fan-out is disabled");
    }

    warnings
}
