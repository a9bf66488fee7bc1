use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigLoadError;
use crate::hosts::HostSource;

pub const DEFAULT_FRAMES_PATH: &str = "frames";
pub const DEFAULT_HTTP_HOST: &str = "localhost";
pub const DEFAULT_HTTP_PORT: u16 = 9080;
pub const DEFAULT_URL_TEMPLATE: &str = "http://{host}:{port}/pub?id={channel}";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_millis(500);
pub const DEFAULT_REDIS_PORT: u16 = 6379;
pub const DEFAULT_REDIS_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_REDIS_SAMPLE_RATE: u64 = 8;
pub const DEFAULT_REDIS_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_TASKS_PER_WORKER: usize = 10;
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_STALE_THRESHOLD: Duration = Duration::from_secs(60);
pub const DEFAULT_LOG_LEVEL: &str = "debug";

/// Fully resolved broadcaster configuration. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Config {
    pub frames_path: PathBuf,
    pub http: HttpConfig,
    pub redis: RedisConfig,
    pub workers: WorkerConfig,
    pub watch: WatchConfig,
    pub logging: LoggingConfig,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub hosts: HostSource,
    pub port: u16,
    pub url_template: String,
    pub filter_channel: Option<String>,
    pub base64_encode: bool,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct RedisConfig {
    /// Empty means the cache is disabled.
    pub hosts: HostSource,
    pub port: u16,
    pub db: i64,
    pub password: Option<String>,
    pub ttl: Duration,
    pub sample_rate: u64,
    pub filter_channel: Option<String>,
    pub timeout: Duration,
}

impl fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConfig")
            .field("hosts", &self.hosts)
            .field("port", &self.port)
            .field("db", &self.db)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("ttl", &self.ttl)
            .field("sample_rate", &self.sample_rate)
            .field("filter_channel", &self.filter_channel)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    pub count: usize,
    pub queue_max_size: usize,
    pub max_tasks_per_worker: usize,
    pub shutdown_grace: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchConfig {
    pub mode: WatchMode,
    pub poll_interval: Duration,
    pub stale_threshold: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchMode {
    #[default]
    Auto,
    Native,
    Poll,
}

impl FromStr for WatchMode {
    type Err = ConfigLoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "native" | "inotify" | "kernel" => Ok(Self::Native),
            "poll" | "polling" => Ok(Self::Poll),
            other => Err(ConfigLoadError::InvalidValue {
                key: "WATCH_MODE",
                value: other.to_string(),
                reason: "expected one of auto, native, poll".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Level name as configured; see [`LoggingConfig::filter_directive`].
    pub level: String,
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// `tracing` filter directive for the configured level. Accepts
    /// the aliases `warning`, `critical` and `notset` alongside the
    /// `tracing` ones.
    pub fn filter_directive(&self) -> Result<&'static str, ConfigLoadError> {
        level_directive(&self.level)
    }
}

pub(crate) fn level_directive(
    level: &str,
) -> Result<&'static str, ConfigLoadError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" | "notset" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" | "critical" | "fatal" => Ok("error"),
        "off" => Ok("off"),
        other => Err(ConfigLoadError::InvalidValue {
            key: "LOG_LEVEL",
            value: other.to_string(),
            reason: "unknown log level".to_string(),
        }),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
