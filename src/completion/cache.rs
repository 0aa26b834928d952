//! Finished summaries and chat transcripts, per article URL.
//!
//! The whole cache is one stored map. Every change is a read-modify-write
//! of that map done under a single lock, so two writers can never merge
//! stale copies of the same record.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::ChatMessage;
use crate::clock::Clock;
use crate::error::Result;
use crate::storage::{self, KvStore};

pub const SUMMARY_CACHE_KEY: &str = "summaryCache";
pub const SUMMARY_CACHE_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    /// Empty when a chat was started before any summary finished.
    pub summary: String,
    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,
    /// Last write; drives eviction.
    pub timestamp: DateTime<Utc>,
}

type SummaryMap = HashMap<String, SummaryRecord>;

pub struct SummaryCache {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    limit: usize,
    write_lock: Mutex<()>,
}

impl SummaryCache {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_limit(store, clock, SUMMARY_CACHE_LIMIT)
    }

    pub fn with_limit(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, limit: usize) -> Self {
        Self {
            store,
            clock,
            limit,
            write_lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<SummaryMap> {
        Ok(storage::load(self.store.as_ref(), SUMMARY_CACHE_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn get(&self, url: &str) -> Result<Option<SummaryRecord>> {
        Ok(self.read_all().await?.remove(url))
    }

    /// Store a finished summary, replacing the record for `url`.
    pub async fn put(&self, url: &str, summary: &str, chat_history: Vec<ChatMessage>) -> Result<()> {
        self.update(url, |record| {
            record.summary = summary.to_string();
            record.chat_history = chat_history;
        })
        .await
    }

    /// Store a finished summary, keeping any transcript already recorded.
    pub async fn set_summary(&self, url: &str, summary: &str) -> Result<()> {
        self.update(url, |record| record.summary = summary.to_string())
            .await
    }

    /// Append completed chat turns to the transcript for `url`.
    pub async fn append_chat(&self, url: &str, turns: Vec<ChatMessage>) -> Result<()> {
        self.update(url, |record| record.chat_history.extend(turns))
            .await
    }

    /// Forget the transcript for `url`, keeping its summary. Unknown URLs
    /// are left alone.
    pub async fn clear_chat(&self, url: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.read_all().await?;
        match all.get_mut(url) {
            Some(record) if !record.chat_history.is_empty() => record.chat_history.clear(),
            _ => return Ok(()),
        }
        storage::save(self.store.as_ref(), SUMMARY_CACHE_KEY, &all).await
    }

    async fn update(&self, url: &str, apply: impl FnOnce(&mut SummaryRecord)) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let now = self.clock.now();

        let mut all = self.read_all().await?;
        let record = all.entry(url.to_string()).or_insert_with(|| SummaryRecord {
            summary: String::new(),
            chat_history: Vec::new(),
            timestamp: now,
        });
        apply(record);
        record.timestamp = now;

        let evicted = evict_oldest(&mut all, self.limit);
        if evicted > 0 {
            tracing::debug!(evicted, kept = all.len(), "Summary cache trimmed");
        }
        storage::save(self.store.as_ref(), SUMMARY_CACHE_KEY, &all).await
    }
}

/// Keep the `limit` most recently written records. Returns how many went.
fn evict_oldest(all: &mut SummaryMap, limit: usize) -> usize {
    if all.len() <= limit {
        return 0;
    }
    let mut by_age: Vec<(String, DateTime<Utc>)> = all
        .iter()
        .map(|(url, record)| (url.clone(), record.timestamp))
        .collect();
    by_age.sort_by(|a, b| b.1.cmp(&a.1));

    let evicted = by_age.len() - limit;
    for (url, _) in by_age.into_iter().skip(limit) {
        all.remove(&url);
    }
    evicted
}
