//! Key-value backends for the result cache
//!
//! The cache only needs get/put/delete plus a way to find entries older
//! than a cutoff. `FileStore` keeps one JSON file per entry under the cache
//! directory; `MemoryStore` keeps everything in a map and is used for
//! ephemeral stations and tests.

use crate::error::{TunecastError, TunecastResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// One persisted cache record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Hex digest of `(source, normalized query)`
    pub key: String,
    /// Serialized `RetrievalResult`
    pub result_payload: String,
    /// When the entry was written
    pub created_at: DateTime<Utc>,
}

/// Minimal storage contract behind `ResultCache`
#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// Fetch an entry by key
    async fn get(&self, key: &str) -> TunecastResult<Option<CacheEntry>>;

    /// Insert or overwrite an entry
    async fn put(&self, entry: CacheEntry) -> TunecastResult<()>;

    /// Delete an entry; deleting a missing key is not an error
    async fn delete(&self, key: &str) -> TunecastResult<()>;

    /// Keys of entries written strictly before `cutoff`
    async fn keys_created_before(&self, cutoff: DateTime<Utc>) -> TunecastResult<Vec<String>>;

    /// Number of stored entries
    async fn len(&self) -> TunecastResult<usize>;

    /// Remove every entry, returning how many were removed
    async fn clear(&self) -> TunecastResult<usize>;
}

/// Directory-backed store, one `<key>.json` file per entry
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create) a store rooted at `dir`
    pub async fn open(dir: PathBuf) -> TunecastResult<Self> {
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| TunecastError::io(format!("creating cache dir {}", dir.display()), e))?;
        Ok(Self { dir })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Every `<key>.json` file in the directory. Files that cannot be
    /// read or decoded come back as `None` so they can still be removed.
    async fn read_all(&self) -> TunecastResult<Vec<(String, Option<CacheEntry>)>> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&self.dir)
            .await
            .map_err(|e| persistence("reading cache directory", e))?;

        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| persistence("reading cache entry", e))?
        {
            let path = item.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let decoded = match fs::read_to_string(&path).await {
                Ok(content) => serde_json::from_str::<CacheEntry>(&content)
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            match decoded {
                Ok(entry) => entries.push((key.to_string(), Some(entry))),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Unreadable cache file");
                    entries.push((key.to_string(), None));
                }
            }
        }

        Ok(entries)
    }
}

fn persistence(context: &str, e: impl std::fmt::Display) -> TunecastError {
    TunecastError::Persistence(format!("{}: {}", context, e))
}

#[async_trait]
impl PersistentStore for FileStore {
    async fn get(&self, key: &str) -> TunecastResult<Option<CacheEntry>> {
        let path = self.entry_path(key);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(persistence(&format!("reading {}", path.display()), e)),
        };

        match serde_json::from_str(&content) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Removing undecodable cache file");
                self.delete(key).await?;
                Ok(None)
            }
        }
    }

    async fn put(&self, entry: CacheEntry) -> TunecastResult<()> {
        let path = self.entry_path(&entry.key);
        let tmp = path.with_extension("json.tmp");
        let content =
            serde_json::to_string_pretty(&entry).map_err(|e| persistence("encoding entry", e))?;

        fs::write(&tmp, content)
            .await
            .map_err(|e| persistence(&format!("writing {}", tmp.display()), e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| persistence(&format!("renaming {}", tmp.display()), e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> TunecastResult<()> {
        let path = self.entry_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(persistence(&format!("removing {}", path.display()), e)),
        }
    }

    /// Undecodable files have no trustworthy age and always qualify
    async fn keys_created_before(&self, cutoff: DateTime<Utc>) -> TunecastResult<Vec<String>> {
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .filter(|(_, entry)| entry.as_ref().is_none_or(|e| e.created_at < cutoff))
            .map(|(key, _)| key)
            .collect())
    }

    async fn len(&self) -> TunecastResult<usize> {
        Ok(self.read_all().await?.len())
    }

    async fn clear(&self) -> TunecastResult<usize> {
        let entries = self.read_all().await?;
        for (key, _) in &entries {
            self.delete(key).await?;
        }
        Ok(entries.len())
    }
}

/// In-process store
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    async fn get(&self, key: &str) -> TunecastResult<Option<CacheEntry>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, entry: CacheEntry) -> TunecastResult<()> {
        self.entries.lock().await.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> TunecastResult<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn keys_created_before(&self, cutoff: DateTime<Utc>) -> TunecastResult<Vec<String>> {
        Ok(self
            .entries
            .lock()
            .await
            .values()
            .filter(|e| e.created_at < cutoff)
            .map(|e| e.key.clone())
            .collect())
    }

    async fn len(&self) -> TunecastResult<usize> {
        Ok(self.entries.lock().await.len())
    }

    async fn clear(&self) -> TunecastResult<usize> {
        let mut entries = self.entries.lock().await;
        let count = entries.len();
        entries.clear();
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(key: &str, age_hours: i64) -> CacheEntry {
        CacheEntry {
            key: key.to_string(),
            result_payload: "{}".to_string(),
            created_at: Utc::now() - chrono::Duration::hours(age_hours),
        }
    }

    #[tokio::test]
    async fn file_store_put_get_delete() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path().join("cache")).await.unwrap();

        store.put(entry("abc", 0)).await.unwrap();
        let loaded = store.get("abc").await.unwrap().unwrap();
        assert_eq!(loaded.key, "abc");

        store.delete("abc").await.unwrap();
        assert!(store.get("abc").await.unwrap().is_none());
        // Second delete is a no-op
        store.delete("abc").await.unwrap();
    }

    #[tokio::test]
    async fn file_store_drops_corrupt_entry_on_get() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path().to_path_buf()).await.unwrap();
        let path = temp.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(store.get("bad").await.unwrap().is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn file_store_sweeps_and_clears_corrupt_files() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path().to_path_buf()).await.unwrap();
        store.put(entry("good", 0)).await.unwrap();
        std::fs::write(temp.path().join("bad.json"), "{\"key\":").unwrap();

        assert_eq!(store.len().await.unwrap(), 2);
        let cutoff = Utc::now() - chrono::Duration::hours(24);
        assert_eq!(
            store.keys_created_before(cutoff).await.unwrap(),
            vec!["bad".to_string()]
        );

        assert_eq!(store.clear().await.unwrap(), 2);
        assert!(!temp.path().join("bad.json").exists());
    }

    #[tokio::test]
    async fn file_store_filters_by_age() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path().to_path_buf()).await.unwrap();
        store.put(entry("old", 48)).await.unwrap();
        store.put(entry("new", 0)).await.unwrap();

        let cutoff = Utc::now() - chrono::Duration::hours(24);
        let keys = store.keys_created_before(cutoff).await.unwrap();
        assert_eq!(keys, vec!["old".to_string()]);
        assert_eq!(store.len().await.unwrap(), 2);

        assert_eq!(store.clear().await.unwrap(), 2);
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn memory_store_overwrites() {
        let store = MemoryStore::new();
        store.put(entry("k", 5)).await.unwrap();
        store.put(entry("k", 0)).await.unwrap();

        assert_eq!(store.len().await.unwrap(), 1);
        let cutoff = Utc::now() - chrono::Duration::hours(1);
        assert!(store.keys_created_before(cutoff).await.unwrap().is_empty());
    }
}
