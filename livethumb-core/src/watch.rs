//! Directory watching on top of `notify`.
//!
//! Two interchangeable strategies sit behind [`DirectoryWatcher`]: kernel
//! notifications ([`NativeWatcher`]) and periodic rescans
//! ([`PollingWatcher`]). Both feed the same [`EventSink`], which records
//! liveness and hands new file paths to the intake queue.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{
    Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode,
    Watcher,
};
use tracing::{debug, error, info, warn};

use crate::error::{BroadcastError, Result};
use crate::frame::WorkItem;
use crate::health::HealthState;
use crate::queue::IntakeQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchMode {
    /// Native notifications, falling back to polling when unavailable.
    #[default]
    Auto,
    Native,
    Poll,
}

impl FromStr for WatchMode {
    type Err = BroadcastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "native" | "inotify" | "kernel" => Ok(Self::Native),
            "poll" | "polling" => Ok(Self::Poll),
            other => Err(BroadcastError::Internal(format!(
                "unknown watch mode {other:?}"
            ))),
        }
    }
}

impl fmt::Display for WatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WatchMode::Auto => "auto",
            WatchMode::Native => "native",
            WatchMode::Poll => "poll",
        })
    }
}

/// Start/stop control over a recursive watch on one root directory.
pub trait DirectoryWatcher: Send + fmt::Debug {
    fn start(&mut self, root: &Path) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    /// Strategy name for logs.
    fn strategy(&self) -> &'static str;
}

/// Receives raw notify events on the watcher's own thread.
#[derive(Debug, Clone)]
pub struct EventSink {
    queue: IntakeQueue,
    health: Arc<HealthState>,
}

impl EventSink {
    pub fn new(queue: IntakeQueue, health: Arc<HealthState>) -> Self {
        Self { queue, health }
    }

    /// Handle one notify callback.
    ///
    /// Blocks the calling thread while the intake queue is full, so this
    /// must run on a plain OS thread rather than inside the async runtime.
    pub fn handle(&self, event: notify::Result<Event>) {
        let event = match event {
            Ok(event) => event,
            Err(err) => {
                error!(error = %err, "watch error");
                return;
            }
        };
        let Some(created) = created_entry(&event) else {
            return;
        };

        self.health.touch();
        if created.is_dir || created.path.is_dir() {
            debug!(path = %created.path.display(), "directory created");
            return;
        }

        debug!(path = %created.path.display(), "frame created");
        if let Err(err) = self.queue.blocking_put(WorkItem::new(created.path)) {
            error!(path = %created.path.display(), error = %err, "failed to enqueue frame");
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Created<'a> {
    path: &'a Path,
    is_dir: bool,
}

/// The path an event brings into existence, if any. Renames into the tree
/// count as creations of their destination.
///
/// Only the `To` half of a rename is taken. inotify follows it with a
/// `Both` event naming the same destination, which must not enqueue the
/// file a second time.
fn created_entry(event: &Event) -> Option<Created<'_>> {
    let (path, is_dir) = match event.kind {
        EventKind::Create(CreateKind::Folder) => (event.paths.first()?, true),
        EventKind::Create(_) => (event.paths.first()?, false),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            (event.paths.first()?, false)
        }
        _ => return None,
    };
    Some(Created { path, is_dir })
}

/// Kernel-notification watcher (`inotify`, `FSEvents`, ...).
pub struct NativeWatcher {
    inner: RecommendedWatcher,
    root: Option<PathBuf>,
}

impl fmt::Debug for NativeWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeWatcher")
            .field("root", &self.root)
            .finish()
    }
}

impl NativeWatcher {
    pub fn new(sink: EventSink) -> Result<Self> {
        let inner = RecommendedWatcher::new(
            move |res: notify::Result<Event>| sink.handle(res),
            Config::default(),
        )?;
        Ok(Self { inner, root: None })
    }
}

impl DirectoryWatcher for NativeWatcher {
    fn start(&mut self, root: &Path) -> Result<()> {
        self.inner.watch(root, RecursiveMode::Recursive)?;
        self.root = Some(root.to_path_buf());
        info!(root = %root.display(), "watching frames directory (native)");
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(root) = self.root.take() {
            self.inner.unwatch(&root)?;
            info!(root = %root.display(), "stopped watching frames directory");
        }
        Ok(())
    }

    fn strategy(&self) -> &'static str {
        "native"
    }
}

/// Rescans the tree on a fixed interval; works on any filesystem.
pub struct PollingWatcher {
    inner: PollWatcher,
    interval: Duration,
    root: Option<PathBuf>,
}

impl fmt::Debug for PollingWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollingWatcher")
            .field("root", &self.root)
            .field("interval", &self.interval)
            .finish()
    }
}

impl PollingWatcher {
    pub fn new(sink: EventSink, interval: Duration) -> Result<Self> {
        let inner = PollWatcher::new(
            move |res: notify::Result<Event>| sink.handle(res),
            Config::default().with_poll_interval(interval),
        )?;
        Ok(Self {
            inner,
            interval,
            root: None,
        })
    }
}

impl DirectoryWatcher for PollingWatcher {
    fn start(&mut self, root: &Path) -> Result<()> {
        self.inner.watch(root, RecursiveMode::Recursive)?;
        self.root = Some(root.to_path_buf());
        info!(
            root = %root.display(),
            interval_ms = self.interval.as_millis() as u64,
            "watching frames directory (polling)"
        );
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(root) = self.root.take() {
            self.inner.unwatch(&root)?;
            info!(root = %root.display(), "stopped watching frames directory");
        }
        Ok(())
    }

    fn strategy(&self) -> &'static str {
        "poll"
    }
}

/// Build a watcher for `mode` and start it on `root`.
///
/// Under [`WatchMode::Auto`] a native watcher that cannot be created or
/// armed is replaced by a polling one.
pub fn select_watcher(
    mode: WatchMode,
    root: &Path,
    sink: EventSink,
    poll_interval: Duration,
) -> Result<Box<dyn DirectoryWatcher>> {
    let mut watcher: Box<dyn DirectoryWatcher> = match mode {
        WatchMode::Native => Box::new(NativeWatcher::new(sink)?),
        WatchMode::Poll => Box::new(PollingWatcher::new(sink, poll_interval)?),
        WatchMode::Auto => {
            let native = NativeWatcher::new(sink.clone()).and_then(|mut w| {
                w.start(root)?;
                Ok(w)
            });
            match native {
                Ok(watcher) => return Ok(Box::new(watcher)),
                Err(err) => {
                    warn!(error = %err, "native file watching unavailable; falling back to polling");
                    Box::new(PollingWatcher::new(sink, poll_interval)?)
                }
            }
        }
    };
    watcher.start(root)?;
    Ok(watcher)
}
