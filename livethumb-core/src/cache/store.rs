use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

use crate::error::{BroadcastError, Result};

/// Key layout shared with the snapshot readers on the other side of the
/// cache.
#[derive(Debug, Clone, Copy)]
pub struct CacheKeys;

impl CacheKeys {
    /// Sorted index of blob keys scored by UTC epoch seconds.
    pub fn channel_index(channel: &str) -> String {
        format!("thumb/{channel}")
    }

    /// Optional per-channel TTL override, in seconds.
    pub fn channel_ttl(channel: &str) -> String {
        format!("thumb/{channel}/ttl")
    }

    pub fn blob(id: uuid::Uuid) -> String {
        format!("blob/{id}")
    }
}

/// The handful of store commands the sliding-window protocol needs.
///
/// One implementation per cache instance; the writer fans out across them.
#[async_trait]
pub trait CacheStore: Send + Sync + fmt::Debug {
    /// Human-readable instance label for logs.
    fn label(&self) -> &str;

    /// `GET key` as a UTF-8 string.
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// `ZADD index score member`
    async fn index_add(&self, index: &str, score: i64, member: &str)
    -> Result<()>;

    /// `SETEX key ttl payload`
    async fn put_blob(&self, key: &str, payload: &[u8], ttl_secs: u64)
    -> Result<()>;

    /// `ZREMRANGEBYSCORE index -inf max_score`, inclusive of `max_score`.
    /// Returns how many members were removed.
    async fn index_prune(&self, index: &str, max_score: i64) -> Result<u64>;
}

/// Connection parameters for one Redis instance.
#[derive(Clone)]
pub struct RedisTarget {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub password: Option<String>,
}

impl fmt::Debug for RedisTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db", &self.db)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl RedisTarget {
    pub fn url(&self) -> Result<Url> {
        let mut url = Url::parse("redis://localhost").map_err(|err| {
            BroadcastError::Internal(format!("redis base url: {err}"))
        })?;
        url.set_host(Some(&self.host)).map_err(|err| {
            BroadcastError::Internal(format!(
                "invalid redis host {:?}: {err}",
                self.host
            ))
        })?;
        let _ = url.set_port(Some(self.port));
        if let Some(password) = &self.password {
            let _ = url.set_password(Some(password));
        }
        url.set_path(&format!("/{}", self.db));
        Ok(url)
    }
}

/// Redis-backed [`CacheStore`] with a lazily established, self-healing
/// connection.
///
/// The connection is opened on first use rather than at startup so an
/// unreachable instance costs one bounded failure per write instead of
/// preventing the broadcaster from starting.
pub struct RedisStore {
    label: String,
    client: redis::Client,
    conn: Mutex<Option<ConnectionManager>>,
    timeout: Duration,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let connected = self
            .conn
            .try_lock()
            .map(|guard| guard.is_some())
            .unwrap_or(true);
        f.debug_struct("RedisStore")
            .field("label", &self.label)
            .field("connected", &connected)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RedisStore {
    pub fn new(target: &RedisTarget, timeout: Duration) -> Result<Self> {
        let url = target.url()?;
        let client = redis::Client::open(url.as_str())?;
        Ok(Self {
            label: format!("{}:{}/{}", target.host, target.port, target.db),
            client,
            conn: Mutex::new(None),
            timeout,
        })
    }

    /// The shared connection, opening one if needed.
    ///
    /// The slot lock is only held to read or fill the slot, never across the
    /// connect itself, so a hung instance costs each caller at most one
    /// timeout. Concurrent first calls may each connect; the first to finish
    /// wins the slot.
    async fn connection(&self) -> Result<ConnectionManager> {
        if let Some(conn) = self.conn.lock().await.as_ref() {
            return Ok(conn.clone());
        }

        info!(store = %self.label, "connecting to Redis cache");
        let conn = self
            .bounded("connect", ConnectionManager::new(self.client.clone()))
            .await??;

        let mut slot = self.conn.lock().await;
        Ok(slot.get_or_insert(conn).clone())
    }

    async fn bounded<F, T>(&self, what: &str, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::time::timeout(self.timeout, fut).await.map_err(|_| {
            BroadcastError::Timeout(format!(
                "redis {what} on {} exceeded {:?}",
                self.label, self.timeout
            ))
        })
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    fn label(&self) -> &str {
        &self.label
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> =
            self.bounded("GET", conn.get(key)).await??;
        Ok(value)
    }

    async fn index_add(
        &self,
        index: &str,
        score: i64,
        member: &str,
    ) -> Result<()> {
        let mut conn = self.connection().await?;
        self.bounded("ZADD", conn.zadd::<_, _, _, ()>(index, member, score))
            .await??;
        Ok(())
    }

    async fn put_blob(
        &self,
        key: &str,
        payload: &[u8],
        ttl_secs: u64,
    ) -> Result<()> {
        let mut conn = self.connection().await?;
        self.bounded("SETEX", conn.set_ex::<_, _, ()>(key, payload, ttl_secs))
            .await??;
        Ok(())
    }

    async fn index_prune(&self, index: &str, max_score: i64) -> Result<u64> {
        let mut conn = self.connection().await?;
        let removed: u64 = self
            .bounded(
                "ZREMRANGEBYSCORE",
                conn.zrembyscore(index, "-inf", max_score),
            )
            .await??;
        debug!(store = %self.label, index, removed, max_score, "pruned index");
        Ok(removed)
    }
}
