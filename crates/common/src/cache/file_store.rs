//! File-backed cache store

use super::CacheStore;
use crate::errors::{AppError, Result};
use crate::market::{CacheEntry, CacheKey};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tracing::debug;

/// Distinguishes temporary files of concurrent writers in one process
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// One JSON file per key under `dir`, named by the SHA-256 of the key.
/// Writes go to a temporary file that is renamed over the record.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn record_path(&self, key: &CacheKey) -> PathBuf {
        let digest = Sha256::digest(key.to_string().as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }
}

#[async_trait]
impl CacheStore for FileStore {
    async fn load(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let path = self.record_path(key);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: CacheEntry = serde_json::from_slice(&bytes).map_err(|e| AppError::CacheError {
            message: format!("corrupt cache record {}: {}", path.display(), e),
        })?;

        // digest collision or hand-edited file
        if &entry.key != key {
            return Ok(None);
        }

        debug!(key = %key, "Loaded persisted cache record");
        Ok(Some(entry))
    }

    async fn save(&self, entry: &CacheEntry) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;

        let path = self.record_path(&entry.key);
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("json.{}.{}.tmp", std::process::id(), seq));
        let json = serde_json::to_vec(entry)?;

        fs::write(&tmp, json).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<bool> {
        match fs::remove_file(self.record_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
