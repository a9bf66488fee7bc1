//! Shared fixtures for core integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    routing::post,
};
use livethumb_core::{BroadcastError, CacheStore, Result};

/// In-memory stand-in for one Redis instance.
#[derive(Debug, Default)]
pub struct MemoryStore {
    label: String,
    pub strings: Mutex<HashMap<String, String>>,
    pub blobs: Mutex<HashMap<String, (Vec<u8>, u64)>>,
    pub index: Mutex<HashMap<String, Vec<(i64, String)>>>,
    pub down: bool,
}

impl MemoryStore {
    pub fn named(label: &str) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            ..Self::default()
        })
    }

    pub fn unreachable(label: &str) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            down: true,
            ..Self::default()
        })
    }

    pub fn set_ttl_override(&self, channel: &str, value: &str) {
        self.strings
            .lock()
            .unwrap()
            .insert(format!("thumb/{channel}/ttl"), value.to_string());
    }

    /// Scores currently in `thumb/<channel>`, ascending.
    pub fn scores(&self, channel: &str) -> Vec<i64> {
        let index = self.index.lock().unwrap();
        let mut scores: Vec<i64> = index
            .get(&format!("thumb/{channel}"))
            .map(|entries| entries.iter().map(|(score, _)| *score).collect())
            .unwrap_or_default();
        scores.sort_unstable();
        scores
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    fn check(&self) -> Result<()> {
        if self.down {
            Err(BroadcastError::Timeout(format!("{} is unreachable", self.label)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn label(&self) -> &str {
        &self.label
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.check()?;
        Ok(self.strings.lock().unwrap().get(key).cloned())
    }

    async fn index_add(&self, index: &str, score: i64, member: &str) -> Result<()> {
        self.check()?;
        let mut all = self.index.lock().unwrap();
        let entries = all.entry(index.to_string()).or_default();
        entries.retain(|(_, existing)| existing != member);
        entries.push((score, member.to_string()));
        Ok(())
    }

    async fn put_blob(&self, key: &str, payload: &[u8], ttl_secs: u64) -> Result<()> {
        self.check()?;
        self.blobs
            .lock()
            .unwrap()
            .insert(key.to_string(), (payload.to_vec(), ttl_secs));
        Ok(())
    }

    async fn index_prune(&self, index: &str, max_score: i64) -> Result<u64> {
        self.check()?;
        let mut all = self.index.lock().unwrap();
        let entries = all.entry(index.to_string()).or_default();
        let before = entries.len();
        entries.retain(|(score, _)| *score > max_score);
        Ok((before - entries.len()) as u64)
    }
}

#[derive(Debug, serde::Deserialize)]
struct PubQuery {
    id: String,
}

/// `(channel, body)` pairs accepted by the in-process subscriber.
#[derive(Debug, Clone, Default)]
pub struct Received(Arc<Mutex<Vec<(String, Vec<u8>)>>>);

impl Received {
    pub fn bodies(&self) -> Vec<(String, Vec<u8>)> {
        self.0.lock().unwrap().clone()
    }

    pub fn total(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

async fn accept(
    State(received): State<Received>,
    Query(query): Query<PubQuery>,
    body: Bytes,
) -> StatusCode {
    received.0.lock().unwrap().push((query.id, body.to_vec()));
    StatusCode::OK
}

async fn reject() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Start an axum server with an accepting `/good/pub` route and a failing
/// `/bad/pub` route. Returns its port.
pub async fn spawn_subscribers() -> (u16, Received) {
    let received = Received::default();
    let app = Router::new()
        .route("/good/pub", post(accept))
        .route("/bad/pub", post(reject))
        .with_state(received.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (port, received)
}

/// URL template routing `{host}` to a path segment on the local subscriber.
pub const LOCAL_TEMPLATE: &str = "http://127.0.0.1:{port}/{host}/pub?id={channel}";

/// Write a frame under `<root>/<channel>/<name>` and return its path.
pub fn drop_frame(root: &Path, channel: &str, name: &str, contents: &[u8]) -> PathBuf {
    let dir = root.join(channel);
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
