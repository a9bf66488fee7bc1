//! Sliding-window frame cache.
//!
//! Each kept frame lands in every configured store as a `blob/<uuid>` key
//! with a TTL, indexed under `thumb/<channel>` by its modification time. The
//! index is pruned on every write so readers only ever see the last TTL
//! seconds of a channel.

pub mod sampling;
pub mod store;

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::filter::ChannelFilter;
use crate::frame::{FrameFile, epoch_seconds};

pub use sampling::{SampleDecision, sample};
pub use store::{CacheKeys, CacheStore, RedisStore, RedisTarget};

#[derive(Debug, Clone)]
pub struct CacheWriterSettings {
    pub default_ttl: Duration,
    /// Keep one frame in `sample_rate`; always at least 1.
    pub sample_rate: u64,
    pub filter: ChannelFilter,
}

impl Default for CacheWriterSettings {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(60),
            sample_rate: 8,
            filter: ChannelFilter::allow_all(),
        }
    }
}

/// What one store now holds for a written frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub channel: String,
    pub blob_key: String,
    pub timestamp: i64,
    pub ttl_secs: u64,
}

#[derive(Debug)]
pub struct StoreWrite {
    pub store: String,
    pub result: Result<CacheEntry>,
}

#[derive(Debug)]
pub enum CacheReport {
    Filtered,
    NotSampled { remainder: u64 },
    Written(Vec<StoreWrite>),
}

impl CacheReport {
    /// Number of stores that accepted the frame.
    pub fn stored(&self) -> usize {
        match self {
            CacheReport::Written(writes) => {
                writes.iter().filter(|write| write.result.is_ok()).count()
            }
            _ => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheWriter {
    stores: Vec<Arc<dyn CacheStore>>,
    settings: CacheWriterSettings,
}

impl CacheWriter {
    pub fn new(
        stores: Vec<Arc<dyn CacheStore>>,
        mut settings: CacheWriterSettings,
    ) -> Self {
        settings.sample_rate = settings.sample_rate.max(1);
        Self { stores, settings }
    }

    /// A writer with no stores; every call is a no-op past sampling.
    pub fn disabled() -> Self {
        Self::new(Vec::new(), CacheWriterSettings::default())
    }

    pub fn is_enabled(&self) -> bool {
        !self.stores.is_empty()
    }

    pub fn settings(&self) -> &CacheWriterSettings {
        &self.settings
    }

    pub async fn write(
        &self,
        frame: &FrameFile,
        modified_at: SystemTime,
        payload: Bytes,
    ) -> CacheReport {
        let channel = frame.channel();
        if !self.settings.filter.admits(channel) {
            debug!(channel, path = %frame.path().display(), "channel filtered out of cache");
            return CacheReport::Filtered;
        }

        let path = frame.path_str();
        let path = path.as_ref();
        let decision = sample(path, self.settings.sample_rate);
        if let SampleDecision::Skip { remainder } = decision {
            debug!(
                path = %path,
                remainder,
                sample_rate = self.settings.sample_rate,
                "frame skipped by cache sampling"
            );
            return CacheReport::NotSampled { remainder };
        }

        let timestamp = epoch_seconds(modified_at);
        let writes = self.stores.iter().map(|store| {
            let payload = payload.clone();
            async move {
                let result = self
                    .write_one(store.as_ref(), channel, timestamp, &payload)
                    .await;
                match &result {
                    Ok(entry) => info!(
                        store = store.label(),
                        path = %path,
                        channel,
                        blob_key = %entry.blob_key,
                        timestamp,
                        ttl = entry.ttl_secs,
                        "cached frame"
                    ),
                    Err(err) => warn!(
                        store = store.label(),
                        path = %path,
                        channel,
                        error = %err,
                        "cache write failed"
                    ),
                }
                StoreWrite {
                    store: store.label().to_string(),
                    result,
                }
            }
        });

        CacheReport::Written(join_all(writes).await)
    }

    async fn write_one(
        &self,
        store: &dyn CacheStore,
        channel: &str,
        timestamp: i64,
        payload: &[u8],
    ) -> Result<CacheEntry> {
        let ttl_secs = resolve_ttl(
            store.get_string(&CacheKeys::channel_ttl(channel)).await?,
            self.settings.default_ttl,
        );
        let blob_key = CacheKeys::blob(Uuid::new_v4());
        let index = CacheKeys::channel_index(channel);

        store.index_add(&index, timestamp, &blob_key).await?;
        store.put_blob(&blob_key, payload, ttl_secs).await?;
        let cutoff = timestamp.saturating_sub_unsigned(ttl_secs);
        store.index_prune(&index, cutoff).await?;

        Ok(CacheEntry {
            channel: channel.to_string(),
            blob_key,
            timestamp,
            ttl_secs,
        })
    }
}

/// Effective TTL in seconds: a positive integer override wins, anything else
/// falls back to `default_ttl` (never below one second).
pub fn resolve_ttl(raw_override: Option<String>, default_ttl: Duration) -> u64 {
    raw_override
        .as_deref()
        .map(str::trim)
        .and_then(|raw| raw.parse::<i64>().ok())
        .and_then(|ttl| u64::try_from(ttl).ok())
        .filter(|ttl| *ttl > 0)
        .unwrap_or_else(|| default_ttl.as_secs().max(1))
}
