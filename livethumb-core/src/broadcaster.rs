use std::time::{Instant, SystemTime};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tracing::{error, info};

use crate::cache::CacheWriter;
use crate::error::Result;
use crate::frame::{FrameFile, WorkItem};
use crate::pool::FrameHandler;
use crate::publish::HttpPublisher;

/// The production [`FrameHandler`]: read a frame, push it to every
/// subscriber and cache store, then delete it.
///
/// Only a failed read keeps the file on disk. Delivery and cache results are
/// logged and otherwise ignored.
#[derive(Debug, Clone)]
pub struct FrameBroadcaster {
    publisher: HttpPublisher,
    cache: CacheWriter,
    base64_encode: bool,
}

impl FrameBroadcaster {
    pub fn new(
        publisher: HttpPublisher,
        cache: CacheWriter,
        base64_encode: bool,
    ) -> Self {
        Self {
            publisher,
            cache,
            base64_encode,
        }
    }

    /// Body sent to HTTP subscribers for `raw`.
    pub fn http_body(&self, raw: &Bytes) -> Bytes {
        if self.base64_encode {
            Bytes::from(STANDARD.encode(raw))
        } else {
            raw.clone()
        }
    }

    async fn process(&self, frame: &FrameFile) -> Result<()> {
        let (raw, modified_at) = read_frame(frame).await?;

        let body = self.http_body(&raw);
        let publish = self
            .publisher
            .publish(frame.channel(), body, frame.path())
            .await;
        let cache = self.cache.write(frame, modified_at, raw).await;

        if let Err(err) = tokio::fs::remove_file(frame.path()).await {
            error!(path = %frame.path().display(), error = %err, "failed to delete frame");
        }

        info!(
            path = %frame.path().display(),
            channel = frame.channel(),
            delivered = publish.delivered(),
            attempted = publish.attempted(),
            cached = cache.stored(),
            "frame broadcast"
        );
        Ok(())
    }
}

async fn read_frame(frame: &FrameFile) -> Result<(Bytes, SystemTime)> {
    let mut file = tokio::fs::File::open(frame.path()).await?;
    let modified_at = file.metadata().await?.modified()?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents).await?;
    Ok((Bytes::from(contents), modified_at))
}

#[async_trait]
impl FrameHandler for FrameBroadcaster {
    async fn handle(&self, item: WorkItem) -> Result<()> {
        let started = Instant::now();
        let frame = FrameFile::from_path(item.into_path())?;
        let outcome = self.process(&frame).await;
        info!(
            path = %frame.path().display(),
            process_time_ms = started.elapsed().as_millis() as u64,
            ok = outcome.is_ok(),
            "processed frame"
        );
        outcome
    }
}
