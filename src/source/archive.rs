//! Durable per-feed item history.
//!
//! A live fetch only ever shows a recent window of a feed. The archive keeps
//! everything seen so far, up to a size bound, so stories that drop out of
//! the live window stay readable until they age out.
//!
//! The merge runs after every refresh, cached or not, so the archive is at
//! most one feed-cache TTL behind the network.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{sort_newest_first, FeedItem};
use crate::clock::Clock;
use crate::error::Result;
use crate::storage::{self, KvStore};

pub const MAX_ARCHIVE_ITEMS: usize = 200;

/// Merge `live` into `prior`, newest first, keeping at most `max_items`.
///
/// On a `link` collision the live record replaces the archived one whole,
/// whatever either timestamp says: live data (refreshed vote and comment
/// counts) always wins. An undated item keeps the `seen_at` of its first
/// sighting. Merging the same live set twice is a no-op.
pub fn merge(
    live: Vec<FeedItem>,
    prior: Vec<FeedItem>,
    max_items: usize,
    now: DateTime<Utc>,
) -> Vec<FeedItem> {
    let mut merged: Vec<FeedItem> = Vec::with_capacity(prior.len() + live.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(merged.capacity());

    for item in prior.into_iter().chain(live) {
        match index.get(&item.link) {
            Some(&slot) => {
                let first_seen = merged[slot].seen_at;
                merged[slot] = item;
                if merged[slot].published.is_none() {
                    merged[slot].seen_at = first_seen.or(merged[slot].seen_at);
                }
            }
            None => {
                index.insert(item.link.clone(), merged.len());
                merged.push(item);
            }
        }
    }

    sort_newest_first(&mut merged, now);
    merged.truncate(max_items);
    merged
}

pub struct ArchiveStore {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    max_items: usize,
}

impl ArchiveStore {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_limit(store, clock, MAX_ARCHIVE_ITEMS)
    }

    pub fn with_limit(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, max_items: usize) -> Self {
        Self {
            store,
            clock,
            max_items,
        }
    }

    pub fn key(source_id: &str) -> String {
        format!("archive_{source_id}")
    }

    /// Archived items for a feed; empty if it has never been merged.
    pub async fn load(&self, source_id: &str) -> Result<Vec<FeedItem>> {
        Ok(storage::load(self.store.as_ref(), &Self::key(source_id))
            .await?
            .unwrap_or_default())
    }

    /// Merge `live` into the stored history, persist, and return the result.
    pub async fn merge_and_persist(
        &self,
        source_id: &str,
        live: Vec<FeedItem>,
    ) -> Result<Vec<FeedItem>> {
        let prior = self.load(source_id).await?;
        let prior_len = prior.len();
        let merged = merge(live, prior, self.max_items, self.clock.now());

        storage::save(self.store.as_ref(), &Self::key(source_id), &merged).await?;
        tracing::debug!(
            source_id,
            prior = prior_len,
            merged = merged.len(),
            "Archive merged"
        );
        Ok(merged)
    }
}
