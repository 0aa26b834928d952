//! Short-lived cache of parsed feed items, keyed by feed URL.
//!
//! Entries expire after [`FEED_CACHE_TTL_MINUTES`]; an expired entry reads
//! as absent and the caller refetches. Keys are overwritten, never evicted:
//! the key space is bounded by the number of configured feeds.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::FeedItem;
use crate::clock::Clock;
use crate::error::Result;
use crate::storage::{self, KvStore};

pub const FEED_CACHE_TTL_MINUTES: i64 = 10;

/// A cached value and when it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, cached_at: DateTime<Utc>) -> Self {
        Self { value, cached_at }
    }

    /// Fresh while strictly younger than `ttl`.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.cached_at < ttl
    }
}

pub struct FeedCache {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl FeedCache {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(store, clock, Duration::minutes(FEED_CACHE_TTL_MINUTES))
    }

    pub fn with_ttl(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { store, clock, ttl }
    }

    pub fn key(url: &str) -> String {
        format!("cache_{url}")
    }

    /// Cached items for `url`, or `None` when absent or expired.
    pub async fn get(&self, url: &str) -> Result<Option<Vec<FeedItem>>> {
        let entry: Option<CacheEntry<Vec<FeedItem>>> =
            storage::load(self.store.as_ref(), &Self::key(url)).await?;
        let now = self.clock.now();
        Ok(entry
            .filter(|e| e.is_fresh(now, self.ttl))
            .map(|e| e.value))
    }

    pub async fn put(&self, url: &str, items: &[FeedItem]) -> Result<()> {
        let entry = CacheEntry::new(items, self.clock.now());
        storage::save(self.store.as_ref(), &Self::key(url), &entry).await
    }

    /// Drop the entries for `urls` so the next read refetches.
    pub async fn invalidate(&self, urls: &[&str]) -> Result<()> {
        let keys: Vec<String> = urls.iter().map(|u| Self::key(u)).collect();
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.store.remove(&keys).await
    }
}
