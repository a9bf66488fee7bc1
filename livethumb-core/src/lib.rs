//! Core broadcast pipeline for livethumb.
//!
//! Files dropped under `<root>/<channel>/` are picked up by a
//! [`watch::DirectoryWatcher`], queued on a bounded [`queue::IntakeQueue`]
//! and processed by a recycling [`pool::WorkerPool`]. Each item is pushed to
//! every HTTP subscriber ([`publish`]) and every cache store ([`cache`]),
//! then deleted. The [`supervisor::Supervisor`] keeps the pool topped up and
//! exits when the event source goes quiet ([`health`]).

pub mod broadcaster;
pub mod cache;
pub mod error;
pub mod filter;
pub mod frame;
pub mod health;
pub mod pool;
pub mod publish;
pub mod queue;
pub mod reaper;
pub mod supervisor;
pub mod watch;

pub use broadcaster::FrameBroadcaster;
pub use cache::{
    CacheEntry, CacheReport, CacheStore, CacheWriter, CacheWriterSettings,
    RedisStore, RedisTarget,
};
pub use error::{BroadcastError, Result};
pub use filter::ChannelFilter;
pub use frame::{FrameFile, WorkItem};
pub use health::{HealthMonitor, HealthSettings, HealthState, Liveness};
pub use pool::{FrameHandler, WorkerPool, WorkerPoolSettings};
pub use publish::{HttpPublisher, PublishReport, PublisherSettings, UrlTemplate};
pub use queue::IntakeQueue;
pub use reaper::reap_leftovers;
pub use supervisor::{ExitReason, Supervisor};
pub use watch::{DirectoryWatcher, EventSink, WatchMode, select_watcher};
