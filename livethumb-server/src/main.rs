//! # livethumb broadcaster
//!
//! Watches a frames directory laid out as `<root>/<channel>/<file>` and
//! broadcasts every new file to the configured HTTP subscribers and Redis
//! instances, deleting it afterwards.
//!
//! The process exits with status 1 when no file events arrive within the
//! stale threshold, so a process supervisor can restart it.

mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use livethumb_config::{
    Config, ConfigLoad, ConfigLoader, ConfigOverrides, WatchMode as ConfigWatchMode,
};
use livethumb_core::{
    CacheStore, CacheWriter, CacheWriterSettings, ChannelFilter, EventSink,
    ExitReason, FrameBroadcaster, HealthMonitor, HealthSettings, HealthState,
    HttpPublisher, IntakeQueue, PublisherSettings, RedisStore, RedisTarget,
    Supervisor, UrlTemplate, WatchMode, WorkerPool, WorkerPoolSettings,
    reap_leftovers, select_watcher,
};
use tracing::{error, info, warn};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "broadcaster")]
#[command(
    about = "Broadcast frames dropped into a watched directory to HTTP subscribers and Redis"
)]
struct Cli {
    /// Root directory to watch (overrides FRAMES_PATH and the config file)
    #[arg(long)]
    frames_path: Option<PathBuf>,

    /// Number of concurrent workers (overrides WORKERS)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Log level (overrides LOG_LEVEL)
    #[arg(long)]
    log_level: Option<String>,

    /// Path to a TOML configuration file
    #[arg(long, env = "BROADCASTER_CONFIG")]
    config: Option<PathBuf>,

    /// Load environment variables from this file instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long, default_value_t = false)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new().with_overrides(ConfigOverrides {
        frames_path: cli.frames_path,
        workers: cli.workers,
        log_level: cli.log_level,
    });
    if let Some(path) = cli.config {
        loader = loader.with_config_path(path);
    }
    if let Some(path) = cli.env_file {
        loader = loader.with_env_file(path);
    }
    let ConfigLoad { config, warnings } =
        loader.load().context("failed to load configuration")?;

    if cli.check_config {
        println!("{config:#?}");
        for warning in warnings.iter() {
            println!("warning: {warning}");
        }
        return Ok(());
    }

    logging::init(&config.logging)?;

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration file loaded");
    }
    for warning in warnings.iter() {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }

    let code = run(config).await?;
    std::process::exit(code);
}

async fn run(config: Config) -> anyhow::Result<i32> {
    let bootstrap_client = reqwest::Client::builder()
        .timeout(config.http.timeout.max(std::time::Duration::from_secs(5)))
        .build()
        .context("failed to build HTTP client")?;

    let http_hosts = config
        .http
        .hosts
        .resolve(&bootstrap_client)
        .await
        .context("failed to resolve HTTP hosts")?;
    let redis_hosts = config
        .redis
        .hosts
        .resolve(&bootstrap_client)
        .await
        .context("failed to resolve Redis hosts")?;

    let publisher = HttpPublisher::new(PublisherSettings {
        hosts: http_hosts,
        port: config.http.port,
        url_template: UrlTemplate::new(config.http.url_template.clone()),
        filter: ChannelFilter::new(config.http.filter_channel.as_deref())
            .context("invalid HTTP_FILTER_CHANNEL")?,
        timeout: config.http.timeout,
    })
    .context("failed to build HTTP publisher")?;

    let mut stores: Vec<Arc<dyn CacheStore>> = Vec::with_capacity(redis_hosts.len());
    for host in redis_hosts {
        let target = RedisTarget {
            host,
            port: config.redis.port,
            db: config.redis.db,
            password: config.redis.password.clone(),
        };
        let store = RedisStore::new(&target, config.redis.timeout)
            .with_context(|| format!("invalid Redis target {target:?}"))?;
        stores.push(Arc::new(store));
    }
    let cache = CacheWriter::new(
        stores,
        CacheWriterSettings {
            default_ttl: config.redis.ttl,
            sample_rate: config.redis.sample_rate,
            filter: ChannelFilter::new(config.redis.filter_channel.as_deref())
                .context("invalid REDIS_FILTER_CHANNEL")?,
        },
    );

    info!(
        frames_path = %config.frames_path.display(),
        http.hosts = ?publisher.hosts(),
        http.base64 = config.http.base64_encode,
        redis.enabled = cache.is_enabled(),
        redis.ttl_secs = config.redis.ttl.as_secs(),
        redis.sample_rate = config.redis.sample_rate,
        workers = config.workers.count,
        queue_max_size = config.workers.queue_max_size,
        max_tasks_per_worker = config.workers.max_tasks_per_worker,
        "broadcaster configuration in effect"
    );

    let broadcaster = Arc::new(FrameBroadcaster::new(
        publisher,
        cache,
        config.http.base64_encode,
    ));

    let reaped = reap_leftovers(&config.frames_path).with_context(|| {
        format!("failed to prepare {}", config.frames_path.display())
    })?;
    if reaped > 0 {
        info!(files = reaped, "removed frames left over from a previous run");
    }

    let queue = IntakeQueue::new(config.workers.queue_max_size);
    let mut pool = WorkerPool::new(
        queue.clone(),
        broadcaster,
        WorkerPoolSettings {
            workers: config.workers.count,
            max_tasks_per_worker: config.workers.max_tasks_per_worker,
        },
    );
    pool.start();

    let health = Arc::new(HealthState::new());
    let sink = EventSink::new(queue, Arc::clone(&health));
    let mut watcher = select_watcher(
        watch_mode(config.watch.mode),
        &config.frames_path,
        sink,
        config.watch.poll_interval,
    )
    .context("failed to start directory watcher")?;
    info!(
        strategy = watcher.strategy(),
        root = %config.frames_path.display(),
        "watching for frames"
    );

    let monitor = HealthMonitor::new(
        health,
        HealthSettings {
            stale_threshold: config.watch.stale_threshold,
        },
    );
    let mut supervisor = Supervisor::new(pool, monitor);
    let reason = supervisor
        .run(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(error = %err, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await;

    if let ExitReason::Stale { idle } = reason {
        error!(
            idle_secs = idle.as_secs(),
            "no file events within the stale threshold; exiting for restart"
        );
    }

    if let Err(err) = watcher.stop() {
        warn!(error = %err, "failed to stop directory watcher");
    }
    supervisor.shutdown(config.workers.shutdown_grace).await;
    info!(exit_code = reason.exit_code(), "broadcaster stopped");

    Ok(reason.exit_code())
}

fn watch_mode(mode: ConfigWatchMode) -> WatchMode {
    match mode {
        ConfigWatchMode::Auto => WatchMode::Auto,
        ConfigWatchMode::Native => WatchMode::Native,
        ConfigWatchMode::Poll => WatchMode::Poll,
    }
}
