//! Redis cache layer
//!
//! Only used for inbound event delivery dedup. When Redis is not configured
//! the `NoOpCacheManager` treats every delivery as new.

use crate::config::RedisConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};

/// Cache key prefixes
mod keys {
    pub const EVENT_DEDUP: &str = "storefront:event_dedup";
}

/// Cache operations needed by the HTTP layer
#[async_trait]
pub trait CacheOperations: Send + Sync {
    /// Atomically mark an event key as seen.
    ///
    /// Returns `true` when the key was already marked (duplicate delivery).
    async fn check_and_mark_event(&self, key: &str, ttl_secs: u64) -> Result<bool>;

    /// Forget an event key so the next delivery is processed again
    async fn clear_event_mark(&self, key: &str) -> Result<()>;

    async fn ping(&self) -> Result<()>;
}

/// Cache manager for Redis operations
#[derive(Clone)]
pub struct CacheManager {
    conn: ConnectionManager,
}

impl CacheManager {
    /// Create a new cache manager
    pub async fn new(config: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str()).map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Failed to create Redis client: {}", e))
        })?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to connect to Redis: {}", e)))?;

        Ok(Self { conn })
    }

    fn event_key(key: &str) -> String {
        format!("{}:{}", keys::EVENT_DEDUP, key)
    }
}

#[async_trait]
impl CacheOperations for CacheManager {
    async fn check_and_mark_event(&self, key: &str, ttl_secs: u64) -> Result<bool> {
        let mut conn = self.conn.clone();
        // SET NX replies nil when the key already exists
        let set: Option<String> = redis::cmd("SET")
            .arg(Self::event_key(key))
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs.max(1))
            .query_async(&mut conn)
            .await?;

        Ok(set.is_none())
    }

    async fn clear_event_mark(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(Self::event_key(key)).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// Cache used when Redis is not configured
#[derive(Clone, Default)]
pub struct NoOpCacheManager;

impl NoOpCacheManager {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CacheOperations for NoOpCacheManager {
    async fn check_and_mark_event(&self, _key: &str, _ttl_secs: u64) -> Result<bool> {
        Ok(false)
    }

    async fn clear_event_mark(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Production cache: Redis when configured, otherwise a no-op
#[derive(Clone)]
pub enum AppCache {
    Redis(CacheManager),
    NoOp(NoOpCacheManager),
}

#[async_trait]
impl CacheOperations for AppCache {
    async fn check_and_mark_event(&self, key: &str, ttl_secs: u64) -> Result<bool> {
        match self {
            AppCache::Redis(c) => c.check_and_mark_event(key, ttl_secs).await,
            AppCache::NoOp(c) => c.check_and_mark_event(key, ttl_secs).await,
        }
    }

    async fn clear_event_mark(&self, key: &str) -> Result<()> {
        match self {
            AppCache::Redis(c) => c.clear_event_mark(key).await,
            AppCache::NoOp(c) => c.clear_event_mark(key).await,
        }
    }

    async fn ping(&self) -> Result<()> {
        match self {
            AppCache::Redis(c) => c.ping().await,
            AppCache::NoOp(c) => c.ping().await,
        }
    }
}
