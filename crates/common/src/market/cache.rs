//! TTL quote cache
//!
//! Entries are immutable `Arc<CacheEntry>` values swapped into a sharded map,
//! so a reader sees either the old or the new entry, never a partial one.
//! Expiry is lazy (checked on read); inserts evict the oldest-fetched entries
//! once the map is over capacity.

use super::{MarketKind, MarketQuote};
use crate::cache::CacheStore;
use crate::clock::Clock;
use crate::config::{CacheConfig, CacheTtlConfig};
use crate::metrics;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub kind: MarketKind,
    pub symbol: String,
}

impl CacheKey {
    pub fn new(kind: MarketKind, symbol: impl Into<String>) -> Self {
        Self {
            kind,
            symbol: symbol.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.symbol)
    }
}

/// Last successful fetch for a key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub quote: MarketQuote,
    pub fetched_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl CacheEntry {
    /// Servable iff `now - fetched_at < ttl_seconds`
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.fetched_at < Duration::seconds(self.ttl_seconds as i64)
    }
}

/// Result of a cache read
#[derive(Debug, Clone)]
pub enum Lookup {
    Fresh(Arc<CacheEntry>),
    /// Present but expired; usable only as a last-known value
    Stale(Arc<CacheEntry>),
    Missing,
}

pub struct QuoteCache {
    entries: DashMap<CacheKey, Arc<CacheEntry>>,
    max_entries: usize,
    ttl: CacheTtlConfig,
    clock: Arc<dyn Clock>,
    store: Option<Arc<dyn CacheStore>>,
}

impl QuoteCache {
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: config.max_entries.max(1),
            ttl: config.ttl.clone(),
            clock,
            store: None,
        }
    }

    /// Persist entries through `store` and consult it on memory misses
    pub fn with_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn ttl_for(&self, kind: MarketKind) -> u64 {
        self.ttl.secs_for(kind)
    }

    /// Classify the entry for `key` against the current time
    pub async fn lookup(&self, key: &CacheKey) -> Lookup {
        let entry = match self.entries.get(key).map(|e| Arc::clone(e.value())) {
            Some(entry) => Some(entry),
            None => self.load_persisted(key).await,
        };

        let lookup = match entry {
            Some(entry) if entry.is_fresh(self.clock.now()) => Lookup::Fresh(entry),
            Some(entry) => Lookup::Stale(entry),
            None => Lookup::Missing,
        };

        let outcome = match &lookup {
            Lookup::Fresh(_) => "hit",
            Lookup::Stale(_) => "stale",
            Lookup::Missing => "miss",
        };
        debug!(key = %key, outcome, "Cache lookup");
        metrics::record_cache(outcome, key.kind.as_str());

        lookup
    }

    /// Store a fresh quote for `key`, replacing any previous entry
    pub async fn insert(&self, key: CacheKey, quote: MarketQuote) -> Arc<CacheEntry> {
        let entry = Arc::new(CacheEntry {
            ttl_seconds: self.ttl_for(key.kind),
            fetched_at: self.clock.now(),
            key: key.clone(),
            quote,
        });

        self.entries.insert(key, Arc::clone(&entry));
        self.evict_overflow();

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&entry).await {
                warn!(key = %entry.key, store = store.name(), error = %e, "Failed to persist cache entry");
            }
        }

        entry
    }

    /// Remove every entry of `kind`; returns how many were dropped from memory
    pub async fn clear(&self, kind: MarketKind) -> usize {
        let keys: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|e| e.key().kind == kind)
            .map(|e| e.key().clone())
            .collect();

        for key in &keys {
            self.entries.remove(key);
            self.remove_persisted(key).await;
        }

        debug!(kind = %kind, removed = keys.len(), "Cache cleared");
        keys.len()
    }

    pub async fn clear_all(&self) -> usize {
        let mut removed = 0;
        for kind in MarketKind::ALL {
            removed += self.clear(kind).await;
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_overflow(&self) {
        while self.entries.len() > self.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|e| e.value().fetched_at)
                .map(|e| e.key().clone());

            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                    debug!(key = %key, "Evicted oldest cache entry");
                }
                None => break,
            }
        }
    }

    async fn load_persisted(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        let store = self.store.as_ref()?;
        match store.load(key).await {
            Ok(Some(entry)) => {
                let entry = Arc::new(entry);
                self.entries.insert(key.clone(), Arc::clone(&entry));
                self.evict_overflow();
                Some(entry)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, store = store.name(), error = %e, "Failed to load persisted cache entry");
                None
            }
        }
    }

    async fn remove_persisted(&self, key: &CacheKey) {
        if let Some(store) = &self.store {
            if let Err(e) = store.remove(key).await {
                warn!(key = %key, store = store.name(), error = %e, "Failed to remove persisted cache entry");
            }
        }
    }
}
