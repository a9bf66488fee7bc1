use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("invalid channel pattern in {key}")]
    InvalidPattern {
        key: &'static str,
        #[source]
        source: regex::Error,
    },
    #[error("failed to fetch host list from {url}")]
    HostList {
        url: String,
        #[source]
        source: HostListError,
    },
    #[error(transparent)]
    Env(#[from] dotenvy::Error),
}

/// Why a host-list URL could not be turned into a list of hosts.
#[derive(Debug, Error)]
pub enum HostListError {
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
    #[error("response is not a JSON array of strings")]
    Body(#[source] serde_json::Error),
}
