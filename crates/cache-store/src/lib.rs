// In crates/cache-store/src/lib.rs

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use app_config::types::CacheSettings;
use tokio::sync::OwnedMutexGuard;
use core_types::{CacheKey, Pair, Series, Timeframe};
use tracing::{debug, warn};

pub mod error;
mod record;

// Re-export the most important types for easy access.
pub use error::{Error, Result};
pub use record::RECORD_VERSION;

const RECORD_EXTENSION: &str = "bars";

/// A directory of checksummed series records, one file per [`CacheKey`].
///
/// Writers for the same key are serialized; a record becomes visible only
/// once it is complete, so readers never observe a partial write.
#[derive(Debug, Clone)]
pub struct Cache(Arc<Inner>);

#[derive(Debug)]
struct Inner {
    dir: PathBuf,
    locks: Mutex<HashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>>,
    tmp_counter: AtomicU64,
}

/// Opens (creating if needed) the cache directory named in the settings.
pub async fn open(settings: &CacheSettings) -> Result<Cache> {
    Cache::open(&settings.dir).await
}

impl Cache {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Cache(Arc::new(Inner {
            dir,
            locks: Mutex::new(HashMap::new()),
            tmp_counter: AtomicU64::new(0),
        })))
    }

    pub fn dir(&self) -> &Path {
        &self.0.dir
    }

    /// Returns the cached series for `key`, if a sound record exists.
    ///
    /// A record that fails its checksum or any series invariant is deleted
    /// and reported as a miss.
    pub async fn get(&self, key: &CacheKey) -> Result<Option<Series>> {
        let _guard = self.lock_key(key).await;

        let path = self.path_for(key);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                warn!(key = %key, error = %e, "Cache record is not valid UTF-8, purging");
                remove_if_exists(&path).await?;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        match record::decode(key, &content) {
            Ok(series) => {
                debug!(key = %key, bars = series.len(), "Cache hit");
                Ok(Some(series))
            }
            Err(reason) => {
                warn!(key = %key, %reason, "Corrupt cache record, purging");
                remove_if_exists(&path).await?;
                Ok(None)
            }
        }
    }

    /// Stores `series` under `key`, replacing any existing record.
    pub async fn put(&self, key: &CacheKey, series: &Series) -> Result<()> {
        let content = record::encode(series)?;

        let _guard = self.lock_key(key).await;

        let path = self.path_for(key);
        let tmp = self.0.dir.join(format!(
            ".{}.{}-{}.tmp",
            key.file_stem(),
            std::process::id(),
            self.0.tmp_counter.fetch_add(1, Ordering::Relaxed)
        ));

        if let Err(e) = tokio::fs::write(&tmp, content.as_bytes()).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(key = %key, bars = series.len(), "Cached series");
        Ok(())
    }

    /// Deletes the record for `key`. Purging a missing record is not an error.
    pub async fn purge(&self, key: &CacheKey) -> Result<()> {
        let _guard = self.lock_key(key).await;
        remove_if_exists(&self.path_for(key)).await
    }

    /// Every cached key for this pair and timeframe, ordered by range start.
    pub async fn keys_for(&self, pair: &Pair, timeframe: Timeframe) -> Result<Vec<CacheKey>> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.0.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let Some(key) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(CacheKey::parse_file_stem)
            else {
                continue;
            };
            if &key.pair == pair && key.timeframe == timeframe {
                keys.push(key);
            }
        }
        keys.sort_by_key(|k| (k.range.start, k.range.end));
        Ok(keys)
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.0.dir.join(format!("{}.{}", key.file_stem(), RECORD_EXTENSION))
    }

    /// Waits for exclusive access to `key`.
    async fn lock_key(&self, key: &CacheKey) -> KeyGuard<'_> {
        let lock = {
            let mut locks = self.0.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.entry(key.clone()).or_default().clone()
        };
        KeyGuard {
            inner: &self.0,
            key: key.clone(),
            guard: Some(lock.lock_owned().await),
        }
    }
}

/// Holds one key's lock; the map entry goes away with its last user.
struct KeyGuard<'a> {
    inner: &'a Inner,
    key: CacheKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        // Release first so our handle no longer counts.
        self.guard.take();
        let mut locks = self.inner.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if locks.get(&self.key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&self.key);
        }
    }
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
