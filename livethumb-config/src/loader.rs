use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::ConfigLoadError;
use crate::hosts::HostSource;
use crate::models::{
    Config, ConfigMetadata, DEFAULT_FRAMES_PATH, DEFAULT_HTTP_HOST,
    DEFAULT_HTTP_PORT, DEFAULT_HTTP_TIMEOUT, DEFAULT_LOG_LEVEL,
    DEFAULT_MAX_TASKS_PER_WORKER, DEFAULT_POLL_INTERVAL, DEFAULT_REDIS_PORT,
    DEFAULT_REDIS_SAMPLE_RATE, DEFAULT_REDIS_TIMEOUT, DEFAULT_REDIS_TTL,
    DEFAULT_SHUTDOWN_GRACE, DEFAULT_STALE_THRESHOLD, DEFAULT_URL_TEMPLATE,
    HttpConfig, LoggingConfig, RedisConfig, WatchConfig, WatchMode,
    WorkerConfig, level_directive,
};
use crate::sources::{EnvConfig, FileConfig};
use crate::util::{
    non_empty, parse_duration, parse_number, presence_flag,
};
use crate::validation::{self, ConfigWarnings};

static DEFAULT_CONFIG_LOCATIONS: LazyLock<Vec<PathBuf>> = LazyLock::new(|| {
    vec![
        PathBuf::from("broadcaster.toml"),
        PathBuf::from("config/broadcaster.toml"),
    ]
});

/// Command-line values that take precedence over every other source.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub frames_path: Option<PathBuf>,
    pub workers: Option<usize>,
    pub log_level: Option<String>,
}

#[derive(Debug, Default, Clone)]
struct ConfigLoaderOptions {
    config_path: Option<PathBuf>,
    env_file: Option<PathBuf>,
    overrides: ConfigOverrides,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.options.overrides = overrides;
        self
    }

    /// Load `.env`, then compose CLI overrides, the process environment, the
    /// TOML file and defaults, in that order of precedence.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let mut load = self.load_with_env(EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Compose from an already-gathered environment. Does not touch
    /// `.env` files or the process environment.
    pub fn load_with_env(
        &self,
        env: EnvConfig,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file, config_path) = self.load_file_config(&env)?;
        self.compose_config(file.unwrap_or_default(), env, config_path)
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let explicit = self
            .options
            .config_path
            .clone()
            .or_else(|| env.config_path.clone());

        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            Some(path) => path,
            None => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .find(|candidate| candidate.exists())
            {
                Some(path) => path.clone(),
                None => return Ok((None, None)),
            },
        };

        let contents =
            fs::read_to_string(&path).map_err(|err| ConfigLoadError::Io {
                path: path.clone(),
                source: err,
            })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
                path: path.clone(),
                source: err,
            })?;

        Ok((Some(file_config), Some(path)))
    }

    fn compose_config(
        &self,
        file: FileConfig,
        env: EnvConfig,
        config_path: Option<PathBuf>,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let overrides = &self.options.overrides;
        let FileConfig {
            frames_path: file_frames_path,
            http: file_http,
            redis: file_redis,
            workers: file_workers,
            watch: file_watch,
            logging: file_logging,
        } = file;

        let frames_path = overrides
            .frames_path
            .clone()
            .or_else(|| non_empty(env.frames_path.clone()).map(PathBuf::from))
            .or(file_frames_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FRAMES_PATH));

        let http = HttpConfig {
            hosts: host_source(
                "HTTP_HOST_LIST_URL",
                env.http_host_list_url.as_deref(),
                file_http.host_list_url.as_deref(),
                env.http_host.clone(),
                file_http.hosts,
                file_http.host,
                Some(DEFAULT_HTTP_HOST),
            )?,
            port: parse_number("HTTP_PORT", env.http_port.as_deref())?
                .or(file_http.port)
                .unwrap_or(DEFAULT_HTTP_PORT),
            url_template: non_empty(env.http_publish_url_template.clone())
                .or(file_http.publish_url_template)
                .unwrap_or_else(|| DEFAULT_URL_TEMPLATE.to_string()),
            filter_channel: channel_pattern(
                "HTTP_FILTER_CHANNEL",
                env.http_filter_channel.clone(),
                file_http.filter_channel,
            )?,
            base64_encode: presence_flag(env.base64_encode.as_deref())
                .or(file_http.base64_encode)
                .unwrap_or(false),
            timeout: layered_duration(
                "HTTP_TIMEOUT",
                env.http_timeout.as_deref(),
                file_http.timeout.as_deref(),
            )?
            .unwrap_or(DEFAULT_HTTP_TIMEOUT),
        };

        let redis = RedisConfig {
            hosts: host_source(
                "REDIS_HOST_LIST_URL",
                env.redis_host_list_url.as_deref(),
                file_redis.host_list_url.as_deref(),
                env.redis_host.clone(),
                file_redis.hosts,
                file_redis.host,
                None,
            )?,
            port: parse_number("REDIS_PORT", env.redis_port.as_deref())?
                .or(file_redis.port)
                .unwrap_or(DEFAULT_REDIS_PORT),
            db: parse_number("REDIS_DB", env.redis_db.as_deref())?
                .or(file_redis.db)
                .unwrap_or(0),
            password: non_empty(env.redis_password.clone())
                .or(non_empty(file_redis.password)),
            ttl: parse_number::<u64>("REDIS_TTL", env.redis_ttl.as_deref())?
                .or(file_redis.ttl)
                .map(std::time::Duration::from_secs)
                .unwrap_or(DEFAULT_REDIS_TTL),
            sample_rate: parse_number(
                "REDIS_SAMPLE_RATE",
                env.redis_sample_rate.as_deref(),
            )?
            .or(file_redis.sample_rate)
            .unwrap_or(DEFAULT_REDIS_SAMPLE_RATE),
            filter_channel: channel_pattern(
                "REDIS_FILTER_CHANNEL",
                env.redis_filter_channel.clone(),
                file_redis.filter_channel,
            )?,
            timeout: layered_duration(
                "REDIS_TIMEOUT",
                env.redis_timeout.as_deref(),
                file_redis.timeout.as_deref(),
            )?
            .unwrap_or(DEFAULT_REDIS_TIMEOUT),
        };

        let default_workers = num_cpus::get();
        let count = match overrides.workers {
            Some(workers) => workers,
            None => parse_number("WORKERS", env.workers.as_deref())?
                .or(file_workers.count)
                .unwrap_or(default_workers),
        };
        let workers = WorkerConfig {
            count,
            queue_max_size: parse_number(
                "EVENT_QUEUE_MAX_SIZE",
                env.event_queue_max_size.as_deref(),
            )?
            .or(file_workers.queue_max_size)
            .unwrap_or(count.max(1) * 2),
            max_tasks_per_worker: parse_number(
                "MAX_TASKS_PER_WORKER",
                env.max_tasks_per_worker.as_deref(),
            )?
            .or(file_workers.max_tasks_per_worker)
            .unwrap_or(DEFAULT_MAX_TASKS_PER_WORKER),
            shutdown_grace: layered_duration(
                "SHUTDOWN_GRACE",
                env.shutdown_grace.as_deref(),
                file_workers.shutdown_grace.as_deref(),
            )?
            .unwrap_or(DEFAULT_SHUTDOWN_GRACE),
        };

        let watch = WatchConfig {
            mode: match non_empty(env.watch_mode.clone()).or(file_watch.mode) {
                Some(raw) => raw.parse::<WatchMode>()?,
                None => WatchMode::default(),
            },
            poll_interval: layered_duration(
                "WATCH_POLL_INTERVAL",
                env.watch_poll_interval.as_deref(),
                file_watch.poll_interval.as_deref(),
            )?
            .unwrap_or(DEFAULT_POLL_INTERVAL),
            stale_threshold: layered_duration(
                "EVENT_STALE_THRESHOLD",
                env.event_stale_threshold.as_deref(),
                file_watch.stale_threshold.as_deref(),
            )?
            .unwrap_or(DEFAULT_STALE_THRESHOLD),
        };

        let logging = LoggingConfig {
            level: overrides
                .log_level
                .clone()
                .or_else(|| non_empty(env.log_level.clone()))
                .or(file_logging.level)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            file: non_empty(env.log_file.clone())
                .map(PathBuf::from)
                .or(file_logging.file),
        };
        level_directive(&logging.level)?;

        let mut config = Config {
            frames_path,
            http,
            redis,
            workers,
            watch,
            logging,
            metadata: ConfigMetadata {
                config_path,
                env_file_loaded: false,
            },
        };

        let warnings = validation::apply_guard_rails(&mut config, default_workers);
        Ok(ConfigLoad { config, warnings })
    }
}

/// Environment first, then the file; both go through the same parser so a
/// malformed file value is reported too.
fn layered_duration(
    key: &'static str,
    env: Option<&str>,
    file: Option<&str>,
) -> Result<Option<std::time::Duration>, ConfigLoadError> {
    match parse_duration(key, env)? {
        Some(duration) => Ok(Some(duration)),
        None => parse_duration(key, file),
    }
}

/// A list URL wins over static hosts at the same layer; the environment
/// layer wins over the file layer.
fn host_source(
    list_key: &'static str,
    env_list_url: Option<&str>,
    file_list_url: Option<&str>,
    env_host: Option<String>,
    file_hosts: Option<Vec<String>>,
    file_host: Option<String>,
    default_host: Option<&str>,
) -> Result<HostSource, ConfigLoadError> {
    let parse_url = |raw: &str| {
        Url::parse(raw.trim()).map_err(|err| ConfigLoadError::InvalidValue {
            key: list_key,
            value: raw.to_string(),
            reason: err.to_string(),
        })
    };

    if let Some(raw) = env_list_url.filter(|raw| !raw.trim().is_empty()) {
        return Ok(HostSource::ListUrl(parse_url(raw)?));
    }
    if let Some(host) = env_host {
        return Ok(HostSource::single(host));
    }
    if let Some(raw) = file_list_url.filter(|raw| !raw.trim().is_empty()) {
        return Ok(HostSource::ListUrl(parse_url(raw)?));
    }
    if let Some(hosts) = file_hosts {
        return Ok(HostSource::Static(
            hosts
                .into_iter()
                .filter(|host| !host.trim().is_empty())
                .collect(),
        ));
    }
    if let Some(host) = file_host {
        return Ok(HostSource::single(host));
    }
    Ok(HostSource::single(default_host.unwrap_or_default()))
}

/// Patterns match from the start of the channel name, so they are validated
/// in that anchored form.
fn channel_pattern(
    key: &'static str,
    env: Option<String>,
    file: Option<String>,
) -> Result<Option<String>, ConfigLoadError> {
    let Some(raw) = non_empty(env).or(non_empty(file)) else {
        return Ok(None);
    };
    Regex::new(&format!("^(?:{raw})"))
        .map_err(|source| ConfigLoadError::InvalidPattern { key, source })?;
    Ok(Some(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn load(vars: &[(&str, &str)]) -> Result<ConfigLoad, ConfigLoadError> {
        let empty = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        ConfigLoader::new()
            .with_config_path(empty.path())
            .load_with_env(EnvConfig::from_vars(vars.iter().copied()))
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let ConfigLoad { config, .. } = load(&[]).unwrap();

        assert_eq!(config.frames_path, PathBuf::from("frames"));
        assert_eq!(config.http.hosts, HostSource::Static(vec!["localhost".into()]));
        assert_eq!(config.http.port, 9080);
        assert_eq!(config.http.url_template, DEFAULT_URL_TEMPLATE);
        assert!(!config.http.base64_encode);
        assert_eq!(config.http.timeout, Duration::from_millis(500));
        assert!(config.redis.hosts.is_empty());
        assert_eq!(config.redis.port, 6379);
        assert_eq!(config.redis.ttl, Duration::from_secs(60));
        assert_eq!(config.redis.sample_rate, 8);
        assert_eq!(config.workers.count, num_cpus::get());
        assert_eq!(config.workers.queue_max_size, num_cpus::get() * 2);
        assert_eq!(config.workers.max_tasks_per_worker, 10);
        assert_eq!(config.watch.mode, WatchMode::Auto);
        assert_eq!(config.watch.stale_threshold, Duration::from_secs(60));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn queue_size_follows_worker_count() {
        let config = load(&[("WORKERS", "3")]).unwrap().config;
        assert_eq!(config.workers.count, 3);
        assert_eq!(config.workers.queue_max_size, 6);
    }

    #[test]
    fn malformed_numbers_name_their_key() {
        let err = load(&[("REDIS_PORT", "sixty")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigLoadError::InvalidValue { key: "REDIS_PORT", .. }
        ));
    }

    #[test]
    fn invalid_filter_pattern_is_an_error() {
        let err = load(&[("HTTP_FILTER_CHANNEL", "(")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigLoadError::InvalidPattern { key: "HTTP_FILTER_CHANNEL", .. }
        ));
    }

    #[test]
    fn zero_values_are_coerced_with_warnings() {
        let ConfigLoad { config, warnings } = load(&[
            ("REDIS_SAMPLE_RATE", "0"),
            ("MAX_TASKS_PER_WORKER", "0"),
            ("WORKERS", "0"),
        ])
        .unwrap();

        assert_eq!(config.redis.sample_rate, 1);
        assert_eq!(config.workers.max_tasks_per_worker, 1);
        assert_eq!(config.workers.count, num_cpus::get().max(1));
        assert!(warnings.mentions("REDIS_SAMPLE_RATE"));
        assert!(warnings.mentions("MAX_TASKS_PER_WORKER"));
        assert!(warnings.mentions("WORKERS"));
    }

    #[test]
    fn base64_flag_is_enabled_by_presence() {
        assert!(load(&[("BASE64_ENCODE", "")]).unwrap().config.http.base64_encode);
        assert!(load(&[("BASE64_ENCODE", "1")]).unwrap().config.http.base64_encode);
        assert!(!load(&[("BASE64_ENCODE", "false")]).unwrap().config.http.base64_encode);
    }

    #[test]
    fn host_list_url_takes_precedence_over_host() {
        let config = load(&[
            ("HTTP_HOST", "edge"),
            ("HTTP_HOST_LIST_URL", "http://registry.local/hosts.json"),
        ])
        .unwrap()
        .config;
        assert!(matches!(config.http.hosts, HostSource::ListUrl(_)));
    }

    #[test]
    fn alias_log_levels_are_accepted() {
        let config = load(&[("LOG_LEVEL", "WARNING")]).unwrap().config;
        assert_eq!(config.logging.filter_directive().unwrap(), "warn");
        assert!(load(&[("LOG_LEVEL", "verbose")]).is_err());
    }

    #[test]
    fn explicit_missing_config_file_is_an_error() {
        let err = ConfigLoader::new()
            .with_config_path("/definitely/not/here.toml")
            .load_with_env(EnvConfig::default())
            .unwrap_err();
        assert!(matches!(err, ConfigLoadError::MissingConfig { .. }));
    }
}
