//! Verdict cache for deep validation.
//!
//! Two horizons apply to the same `cached_at` timestamp: a row younger than the
//! freshness window is trusted as-is, and a row older than the retention
//! ceiling may be dropped by housekeeping. Between the two, a row is kept but
//! treated as a miss, and the next `store` overwrites it.

use crate::config::CacheConfig;
use crate::validator::ValidationMetadata;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// One stored verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub url: String,
    pub is_valid: bool,
    pub metadata: ValidationMetadata,
    pub cached_at: DateTime<Utc>,
}

/// Backing storage for cached verdicts, keyed by URL.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, url: &str) -> Result<Option<CacheEntry>>;

    /// Inserts or replaces the entry for `entry.url`.
    async fn put(&self, entry: CacheEntry) -> Result<()>;

    /// Removes every entry cached before `cutoff`, returning how many went.
    async fn remove_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// Process-local store.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, url: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.read().await.get(url).cloned())
    }

    async fn put(&self, entry: CacheEntry) -> Result<()> {
        self.entries.write().await.insert(entry.url.clone(), entry);
        Ok(())
    }

    async fn remove_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.cached_at >= cutoff);
        Ok(before - entries.len())
    }
}

/// The `ValidationCache` struct applies the freshness rules on top of a `CacheStore`.
pub struct ValidationCache<S = MemoryCacheStore> {
    store: S,
    freshness: Duration,
    retention: Duration,
}

impl ValidationCache<MemoryCacheStore> {
    pub fn in_memory(config: &CacheConfig) -> Self {
        Self::new(MemoryCacheStore::new(), config)
    }
}

impl<S: CacheStore> ValidationCache<S> {
    pub fn new(store: S, config: &CacheConfig) -> Self {
        Self {
            store,
            freshness: config.freshness(),
            retention: config.retention(),
        }
    }

    pub fn store_ref(&self) -> &S {
        &self.store
    }

    /// Returns a fresh entry for `url`, or `None` when there is none, it is stale,
    /// or `force_fresh` is set.
    pub async fn lookup(&self, url: &str, force_fresh: bool) -> Result<Option<CacheEntry>> {
        self.lookup_at(url, force_fresh, Utc::now()).await
    }

    pub async fn lookup_at(
        &self,
        url: &str,
        force_fresh: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>> {
        if force_fresh {
            return Ok(None);
        }

        let Some(entry) = self.store.get(url).await? else {
            return Ok(None);
        };

        if is_within(entry.cached_at, now, self.freshness) {
            Ok(Some(entry))
        } else {
            debug!("Cached verdict for {} is stale", url);
            Ok(None)
        }
    }

    /// Records a fresh verdict, overwriting any previous row for `url`.
    pub async fn store(&self, url: &str, is_valid: bool, metadata: ValidationMetadata) -> Result<()> {
        self.store_at(url, is_valid, metadata, Utc::now()).await
    }

    pub async fn store_at(
        &self,
        url: &str,
        is_valid: bool,
        metadata: ValidationMetadata,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.store
            .put(CacheEntry {
                url: url.to_string(),
                is_valid,
                metadata,
                cached_at: now,
            })
            .await
    }

    /// Drops rows older than the retention ceiling.
    ///
    /// Nothing in the pipeline calls this; it exists for an external sweep.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - to_chrono(self.retention);
        self.store.remove_older_than(cutoff).await
    }
}

fn is_within(cached_at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    now.signed_duration_since(cached_at) < to_chrono(window)
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::weeks(52 * 100))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> ValidationCache {
        ValidationCache::in_memory(&CacheConfig::default())
    }

    fn metadata() -> ValidationMetadata {
        ValidationMetadata {
            status: Some(200),
            title: Some("Welcome".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_lookup_returns_stored_verdict() {
        let cache = cache();
        cache.store("https://www.nature.com/a", true, metadata()).await.unwrap();

        let entry = cache.lookup("https://www.nature.com/a", false).await.unwrap().unwrap();

        assert!(entry.is_valid);
        assert_eq!(entry.metadata, metadata());
    }

    #[tokio::test]
    async fn test_force_fresh_always_misses() {
        let cache = cache();
        cache.store("https://www.nature.com/a", true, metadata()).await.unwrap();

        assert!(cache.lookup("https://www.nature.com/a", true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_entry_is_a_miss_but_kept() {
        let cache = cache();
        let now = Utc::now();
        cache
            .store_at("https://www.nature.com/a", false, metadata(), now - chrono::Duration::hours(25))
            .await
            .unwrap();

        assert!(cache.lookup_at("https://www.nature.com/a", false, now).await.unwrap().is_none());
        assert_eq!(cache.store_ref().len().await, 1);
    }

    #[tokio::test]
    async fn test_entry_inside_window_is_trusted() {
        let cache = cache();
        let now = Utc::now();
        cache
            .store_at("https://www.nature.com/a", false, metadata(), now - chrono::Duration::hours(23))
            .await
            .unwrap();

        let entry = cache.lookup_at("https://www.nature.com/a", false, now).await.unwrap();
        assert!(!entry.unwrap().is_valid);
    }

    #[tokio::test]
    async fn test_store_overwrites() {
        let cache = cache();
        cache.store("https://www.nature.com/a", false, metadata()).await.unwrap();
        cache.store("https://www.nature.com/a", true, metadata()).await.unwrap();

        let entry = cache.lookup("https://www.nature.com/a", false).await.unwrap().unwrap();
        assert!(entry.is_valid);
        assert_eq!(cache.store_ref().len().await, 1);
    }

    #[tokio::test]
    async fn test_purge_drops_rows_past_retention() {
        let cache = cache();
        let now = Utc::now();
        cache
            .store_at("https://old.nature.com/a", true, metadata(), now - chrono::Duration::days(31))
            .await
            .unwrap();
        cache
            .store_at("https://new.nature.com/a", true, metadata(), now - chrono::Duration::days(2))
            .await
            .unwrap();

        assert_eq!(cache.purge_expired(now).await.unwrap(), 1);
        assert_eq!(cache.store_ref().len().await, 1);
    }
}
