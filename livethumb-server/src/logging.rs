use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::Context;
use livethumb_config::LoggingConfig;
use tracing_subscriber::{
    EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
/// When a log file is configured, records go there instead of stdout.
pub fn init(logging: &LoggingConfig) -> anyhow::Result<()> {
    let directive = logging
        .filter_directive()
        .context("invalid log level")?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directive));

    let file_layer = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| {
                    format!("failed to open log file {}", path.display())
                })?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let stdout_layer =
        file_layer.is_none().then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(())
}
