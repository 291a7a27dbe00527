//! Persistent quote cache backends
//!
//! Provides:
//! - `CacheStore` interface used by the in-memory quote cache
//! - File backend (one JSON record per key)
//! - Redis backend (one JSON value per key with retention TTL)
//!
//! Records carry their own `fetched_at`/`ttl_seconds`; freshness is decided
//! by the quote cache on load, never by the backend.

mod file_store;
mod redis_store;

pub use file_store::FileStore;
pub use redis_store::RedisStore;

use crate::config::{PersistenceBackend, PersistenceConfig};
use crate::errors::Result;
use crate::market::{CacheEntry, CacheKey};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Durable home for cache entries
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn load(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

    /// Replace the record for `entry.key`; never leaves a partial record
    async fn save(&self, entry: &CacheEntry) -> Result<()>;

    /// Returns whether a record existed
    async fn remove(&self, key: &CacheKey) -> Result<bool>;

    fn name(&self) -> &'static str;
}

/// Open the configured backend, or `None` when persistence is off
pub async fn open_store(config: &PersistenceConfig) -> Result<Option<Arc<dyn CacheStore>>> {
    let store: Arc<dyn CacheStore> = match config.backend {
        PersistenceBackend::None => return Ok(None),
        PersistenceBackend::File => Arc::new(FileStore::new(&config.file_dir)),
        PersistenceBackend::Redis => Arc::new(RedisStore::connect(config).await?),
    };

    info!(backend = store.name(), "Quote cache persistence enabled");
    Ok(Some(store))
}
