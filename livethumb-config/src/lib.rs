//! Configuration for the livethumb broadcaster.
//!
//! Values are layered from command-line overrides, the process environment
//! (optionally seeded from a `.env` file), a TOML file and built-in
//! defaults, in that order. Destination host lists may be given inline or as
//! a URL serving a JSON array, resolved once at startup.

pub mod error;
pub mod hosts;
pub mod loader;
pub mod models;
pub mod sources;
pub mod util;
pub mod validation;

pub use error::{ConfigLoadError, HostListError};
pub use hosts::HostSource;
pub use loader::{ConfigLoad, ConfigLoader, ConfigOverrides};
pub use models::{
    Config, ConfigMetadata, HttpConfig, LoggingConfig, RedisConfig,
    WatchConfig, WatchMode, WorkerConfig,
};
pub use sources::{EnvConfig, FileConfig};
pub use validation::{ConfigWarning, ConfigWarnings};
