//! Session-scoped memo of research results.
//!
//! One [`ResearchCache`] lives for a research session and is shared through an
//! `Arc`. Entries never expire; a forced refresh overwrites them.

use std::collections::HashMap;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;
use crate::model::{PackageIdentity, ResearchRecord};

/// A cached record and when it was stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Package the record belongs to
    pub key: PackageIdentity,
    /// Cached research result
    pub record: ResearchRecord,
    /// When the record was written to the cache
    pub stored_at: DateTime<Utc>,
}

/// In-memory research cache keyed by package identity
#[derive(Debug, Default)]
pub struct ResearchCache {
    store: RwLock<HashMap<PackageIdentity, CacheEntry>>,
    key_locks: Mutex<HashMap<PackageIdentity, Arc<Mutex<()>>>>,
}

impl ResearchCache {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached record for `key`
    pub async fn get(&self, key: &PackageIdentity) -> Option<ResearchRecord> {
        let store = self.store.read().await;
        store.get(key).map(|entry| entry.record.clone())
    }

    /// Returns the full entry for `key`
    pub async fn entry(&self, key: &PackageIdentity) -> Option<CacheEntry> {
        let store = self.store.read().await;
        store.get(key).cloned()
    }

    /// Stores `record` under `key`, replacing any previous entry
    pub async fn put(&self, key: PackageIdentity, record: ResearchRecord) {
        debug!(%key, "caching research record");
        let entry = CacheEntry {
            key: key.clone(),
            record,
            stored_at: Utc::now(),
        };
        let mut store = self.store.write().await;
        store.insert(key, entry);
    }

    /// Removes the entry for `key`, returning whether one existed
    pub async fn invalidate(&self, key: &PackageIdentity) -> bool {
        let mut store = self.store.write().await;
        store.remove(key).is_some()
    }

    /// Number of cached records
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    /// True when nothing is cached
    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    /// Drops every entry
    pub async fn clear(&self) {
        self.store.write().await.clear();
    }

    /// Copies every entry out, ordered by key for stable output
    pub async fn snapshot(&self) -> Vec<CacheEntry> {
        let store = self.store.read().await;
        let mut entries: Vec<CacheEntry> = store.values().cloned().collect();
        entries.sort_by(|a, b| a.key.to_string().cmp(&b.key.to_string()));
        entries
    }

    /// Loads entries from a snapshot; existing keys are overwritten
    pub async fn restore(&self, entries: Vec<CacheEntry>) {
        let mut store = self.store.write().await;
        for entry in entries {
            store.insert(entry.key.clone(), entry);
        }
    }

    /// Serializes fetches of one key; other keys are unaffected
    ///
    /// The guard must be held across the cache re-check, the fetch and the write.
    pub async fn lock_key(&self, key: &PackageIdentity) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.key_locks.lock().await;
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecosystem::Ecosystem;
    use crate::model::PackageMetadata;
    use std::time::Duration;

    fn key(name: &str, ecosystem: Ecosystem) -> PackageIdentity {
        PackageIdentity::new(name, ecosystem).unwrap()
    }

    fn record(key: &PackageIdentity, version: &str) -> ResearchRecord {
        let metadata = PackageMetadata {
            version: Some(version.into()),
            ..PackageMetadata::named(key.name())
        };
        ResearchRecord::new(key.clone(), metadata, "# readme".into(), Vec::new(), vec!["test".into()])
    }

    #[tokio::test]
    async fn test_put_get_overwrite() {
        let cache = ResearchCache::new();
        let k = key("left-pad", Ecosystem::Node);
        assert!(cache.get(&k).await.is_none());

        cache.put(k.clone(), record(&k, "1.0.0")).await;
        cache.put(k.clone(), record(&k, "1.3.0")).await;

        assert_eq!(cache.len().await, 1);
        let cached = cache.get(&k).await.unwrap();
        assert_eq!(cached.metadata.version.as_deref(), Some("1.3.0"));
    }

    #[tokio::test]
    async fn test_ecosystem_is_part_of_the_key() {
        let cache = ResearchCache::new();
        let node = key("rack", Ecosystem::Node);
        let ruby = key("rack", Ecosystem::Ruby);
        cache.put(ruby.clone(), record(&ruby, "3.0.8")).await;

        assert!(cache.get(&node).await.is_none());
        assert!(cache.get(&ruby).await.is_some());
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cache = ResearchCache::new();
        let a = key("a", Ecosystem::Python);
        let b = key("b", Ecosystem::Python);
        cache.put(a.clone(), record(&a, "1")).await;
        cache.put(b.clone(), record(&b, "1")).await;

        assert!(cache.invalidate(&a).await);
        assert!(!cache.invalidate(&a).await);
        assert_eq!(cache.len().await, 1);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_restore() {
        let cache = ResearchCache::new();
        let a = key("requests", Ecosystem::Python);
        let b = key("left-pad", Ecosystem::Node);
        cache.put(a.clone(), record(&a, "2.31.0")).await;
        cache.put(b.clone(), record(&b, "1.3.0")).await;

        let snapshot = cache.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].key, b);

        let json = serde_json::to_string(&snapshot).unwrap();
        let restored = ResearchCache::new();
        restored.restore(serde_json::from_str(&json).unwrap()).await;
        assert_eq!(restored.entry(&a).await, cache.entry(&a).await);
    }

    #[tokio::test]
    async fn test_key_lock_serializes_same_key_only() {
        let cache = Arc::new(ResearchCache::new());
        let a = key("a", Ecosystem::Node);
        let b = key("b", Ecosystem::Node);

        let guard = cache.lock_key(&a).await;

        // A different key is never blocked.
        tokio::time::timeout(Duration::from_millis(200), cache.lock_key(&b))
            .await
            .expect("independent key must not contend");

        let waiter = {
            let cache = Arc::clone(&cache);
            let a = a.clone();
            tokio::spawn(async move {
                let _guard = cache.lock_key(&a).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter proceeds once the guard drops")
            .unwrap();
    }
}
