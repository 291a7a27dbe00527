//! Redis-backed cache store

use super::CacheStore;
use crate::config::PersistenceConfig;
use crate::errors::{AppError, Result};
use crate::market::{CacheEntry, CacheKey};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::debug;

/// One JSON value per key. Values expire `retention_secs` after their
/// freshness window so an expired quote can still back a stale answer.
pub struct RedisStore {
    connection: ConnectionManager,
    key_prefix: String,
    retention_secs: u64,
}

impl RedisStore {
    /// Connect and verify the server answers
    pub async fn connect(config: &PersistenceConfig) -> Result<Self> {
        let client = Client::open(config.redis_url.as_str()).map_err(|e| AppError::CacheError {
            message: format!("Failed to create Redis client: {}", e),
        })?;

        let connection = ConnectionManager::new(client).await.map_err(|e| AppError::CacheError {
            message: format!("Failed to connect to Redis: {}", e),
        })?;

        let store = Self {
            connection,
            key_prefix: config.key_prefix.clone(),
            retention_secs: config.retention_secs,
        };
        store.ping().await?;
        Ok(store)
    }

    /// Build a prefixed key
    fn key(&self, key: &CacheKey) -> String {
        format!("{}:quote:{}", self.key_prefix, key)
    }

    /// Ping Redis to check connectivity
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Redis ping failed: {}", e),
            })?;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn load(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let full_key = self.key(key);
        let mut conn = self.connection.clone();

        let value: Option<String> = conn.get(&full_key).await?;
        match value {
            Some(json) => {
                let entry = serde_json::from_str(&json).map_err(|e| AppError::CacheError {
                    message: format!("Failed to parse cached value '{}': {}", full_key, e),
                })?;
                debug!(key = %full_key, "Redis cache hit");
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, entry: &CacheEntry) -> Result<()> {
        let full_key = self.key(&entry.key);
        let json = serde_json::to_string(entry)?;
        let expire = entry.ttl_seconds + self.retention_secs;

        let mut conn = self.connection.clone();
        let _: () = conn.set_ex(&full_key, json, expire).await?;

        debug!(key = %full_key, expire, "Redis cache set");
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<bool> {
        let mut conn = self.connection.clone();
        let deleted: i32 = conn.del(self.key(key)).await?;
        Ok(deleted > 0)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
