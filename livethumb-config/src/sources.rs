use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    pub frames_path: Option<PathBuf>,
    #[serde(default)]
    pub http: FileHttpConfig,
    #[serde(default)]
    pub redis: FileRedisConfig,
    #[serde(default)]
    pub workers: FileWorkerConfig,
    #[serde(default)]
    pub watch: FileWatchConfig,
    #[serde(default)]
    pub logging: FileLoggingConfig,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileHttpConfig {
    pub host: Option<String>,
    pub hosts: Option<Vec<String>>,
    pub host_list_url: Option<String>,
    pub port: Option<u16>,
    pub publish_url_template: Option<String>,
    pub filter_channel: Option<String>,
    pub base64_encode: Option<bool>,
    /// Humantime string, e.g. `"500ms"`.
    pub timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileRedisConfig {
    pub host: Option<String>,
    pub hosts: Option<Vec<String>>,
    pub host_list_url: Option<String>,
    pub port: Option<u16>,
    pub db: Option<i64>,
    pub password: Option<String>,
    /// Seconds.
    pub ttl: Option<u64>,
    pub sample_rate: Option<u64>,
    pub filter_channel: Option<String>,
    pub timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileWorkerConfig {
    pub count: Option<usize>,
    pub queue_max_size: Option<usize>,
    pub max_tasks_per_worker: Option<usize>,
    pub shutdown_grace: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileWatchConfig {
    pub mode: Option<String>,
    pub poll_interval: Option<String>,
    pub stale_threshold: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileLoggingConfig {
    pub level: Option<String>,
    pub file: Option<PathBuf>,
}

/// Environment-derived configuration values.
///
/// Values stay as raw strings here; they are parsed during composition so a
/// malformed value can be reported against its key.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub frames_path: Option<String>,

    pub http_host: Option<String>,
    pub http_host_list_url: Option<String>,
    pub http_port: Option<String>,
    pub http_publish_url_template: Option<String>,
    pub http_filter_channel: Option<String>,
    pub base64_encode: Option<String>,
    pub http_timeout: Option<String>,

    pub redis_host: Option<String>,
    pub redis_host_list_url: Option<String>,
    pub redis_port: Option<String>,
    pub redis_db: Option<String>,
    pub redis_password: Option<String>,
    pub redis_ttl: Option<String>,
    pub redis_sample_rate: Option<String>,
    pub redis_filter_channel: Option<String>,
    pub redis_timeout: Option<String>,

    pub workers: Option<String>,
    pub event_queue_max_size: Option<String>,
    pub max_tasks_per_worker: Option<String>,
    pub shutdown_grace: Option<String>,

    pub watch_mode: Option<String>,
    pub watch_poll_interval: Option<String>,
    pub event_stale_threshold: Option<String>,

    pub log_file: Option<String>,
    pub log_level: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build from an explicit set of variables instead of the process
    /// environment.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        let mut take = |key: &str| vars.remove(key);

        Self {
            config_path: take("BROADCASTER_CONFIG")
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
            frames_path: take("FRAMES_PATH"),

            http_host: take("HTTP_HOST"),
            http_host_list_url: take("HTTP_HOST_LIST_URL"),
            http_port: take("HTTP_PORT"),
            http_publish_url_template: take("HTTP_PUBLISH_URL_TEMPLATE")
                .or_else(|| take("HTTP_PUBLISH_URLS_TEMPLATE")),
            http_filter_channel: take("HTTP_FILTER_CHANNEL"),
            base64_encode: take("BASE64_ENCODE"),
            http_timeout: take("HTTP_TIMEOUT"),

            redis_host: take("REDIS_HOST"),
            redis_host_list_url: take("REDIS_HOST_LIST_URL"),
            redis_port: take("REDIS_PORT"),
            redis_db: take("REDIS_DB"),
            redis_password: take("REDIS_PASSWORD"),
            redis_ttl: take("REDIS_TTL"),
            redis_sample_rate: take("REDIS_SAMPLE_RATE"),
            redis_filter_channel: take("REDIS_FILTER_CHANNEL"),
            redis_timeout: take("REDIS_TIMEOUT"),

            workers: take("WORKERS"),
            event_queue_max_size: take("EVENT_QUEUE_MAX_SIZE"),
            max_tasks_per_worker: take("MAX_TASKS_PER_WORKER"),
            shutdown_grace: take("SHUTDOWN_GRACE"),

            watch_mode: take("WATCH_MODE"),
            watch_poll_interval: take("WATCH_POLL_INTERVAL"),
            event_stale_threshold: take("EVENT_STALE_THRESHOLD"),

            log_file: take("LOG_FILE"),
            log_level: take("LOG_LEVEL"),
        }
    }
}
