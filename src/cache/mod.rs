//! Content-addressed result cache
//!
//! Maps a `(query, source)` pair to a previously produced successful
//! `RetrievalResult`, so repeated downloads of the same track skip the
//! upstream provider entirely.
//!
//! # Validity
//!
//! An entry is served only while both hold:
//!
//! - it is younger than the configured TTL
//! - the artifact it points at still exists on disk
//!
//! Anything else is deleted on the lookup that notices it. Store failures
//! never escape: they are logged and reported as a miss.

pub mod store;

pub use store::{CacheEntry, FileStore, MemoryStore, PersistentStore};

use crate::model::{normalize_query, RetrievalResult, Source};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// TTL-bound cache of successful retrievals
pub struct ResultCache {
    store: Arc<dyn PersistentStore>,
    ttl: chrono::Duration,
}

impl ResultCache {
    /// Create a cache over `store` with entries living for `ttl`
    pub fn new(store: Arc<dyn PersistentStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Cache that lives only as long as the process
    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(Arc::new(MemoryStore::new()), ttl)
    }

    /// Derive the fixed-length key for a query/source pair
    pub fn cache_key(query: &str, source: Source) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.tag().as_bytes());
        hasher.update(b":");
        hasher.update(normalize_query(query).as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Look up a cached result, evicting it if stale
    pub async fn get(&self, query: &str, source: Source) -> Option<RetrievalResult> {
        self.get_at(query, source, Utc::now()).await
    }

    async fn get_at(
        &self,
        query: &str,
        source: Source,
        now: DateTime<Utc>,
    ) -> Option<RetrievalResult> {
        let key = Self::cache_key(query, source);

        let entry = match self.store.get(&key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                warn!(query, %source, error = %e, "Cache read failed");
                return None;
            }
        };

        if now - entry.created_at > self.ttl {
            debug!(query, %source, "Cache entry expired");
            self.evict(&key).await;
            return None;
        }

        let result: RetrievalResult = match serde_json::from_str(&entry.result_payload) {
            Ok(result) => result,
            Err(e) => {
                warn!(query, error = %e, "Dropping undecodable cache entry");
                self.evict(&key).await;
                return None;
            }
        };

        if !result.is_success() || !result.is_well_formed() {
            self.evict(&key).await;
            return None;
        }

        let exists = match result.artifact_path() {
            Some(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            None => false,
        };
        if !exists {
            info!(query, %source, "Cached artifact is gone, dropping entry");
            self.evict(&key).await;
            return None;
        }

        debug!(query, %source, "Cache hit");
        Some(result)
    }

    /// Store a successful result; failures are never cached
    pub async fn set(&self, query: &str, source: Source, result: &RetrievalResult) {
        if !result.is_success() || result.track().is_none() {
            return;
        }

        let key = Self::cache_key(query, source);
        let payload = match serde_json::to_string(result) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(query, error = %e, "Failed to encode cache entry");
                return;
            }
        };

        let entry = CacheEntry {
            key,
            result_payload: payload,
            created_at: Utc::now(),
        };

        match self.store.put(entry).await {
            Ok(()) => debug!(query, %source, "Cached result"),
            Err(e) => warn!(query, %source, error = %e, "Cache write failed"),
        }
    }

    /// Delete every entry older than the TTL, returning how many went
    pub async fn sweep(&self) -> usize {
        let Some(cutoff) = Utc::now().checked_sub_signed(self.ttl) else {
            return 0;
        };
        let keys = match self.store.keys_created_before(cutoff).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Cache sweep failed");
                return 0;
            }
        };

        let mut removed = 0;
        for key in keys {
            match self.store.delete(&key).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(key = %key, error = %e, "Failed to remove expired cache entry"),
            }
        }
        removed
    }

    /// Number of stored entries, including ones not yet found stale
    pub async fn entry_count(&self) -> usize {
        self.store.len().await.unwrap_or_else(|e| {
            warn!(error = %e, "Cache count failed");
            0
        })
    }

    /// Remove all entries
    pub async fn clear(&self) -> usize {
        self.store.clear().await.unwrap_or_else(|e| {
            warn!(error = %e, "Cache clear failed");
            0
        })
    }

    /// Run `sweep` every `interval` until `token` is cancelled
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        let removed = cache.sweep().await;
                        info!(removed, "Cache sweep finished");
                    }
                }
            }
        })
    }

    async fn evict(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            warn!(key, error = %e, "Failed to evict cache entry");
        }
    }
}
