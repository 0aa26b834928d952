//! Feed synchronization.
//!
//! One [`FeedSynchronizer::refresh`] call brings every requested feed up to
//! date: fetch (or reuse the cached parse), merge into the archive, and hand
//! back the full merged history per feed. Feeds are fetched concurrently and
//! joined all-settle, so a failing feed never holds up or spoils the others.
//! The results carry the whole archive; slicing it into pages is the
//! caller's business.

use std::sync::Arc;

use futures_util::future::join_all;

use crate::clock::Clock;
use crate::config::CacheConfig;
use crate::error::{Result, SourceError};
use crate::http::HttpClient;
use crate::source::{order_sources, parse_document, ArchiveStore, FeedCache, FeedItem, FeedSource};
use crate::storage::{self, KvStore};

/// Storage key of the saved display order.
pub const FEED_ORDER_KEY: &str = "feedOrder";

/// A successfully refreshed feed and its merged, newest-first history.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFeed {
    pub feed: FeedSource,
    pub items: Vec<FeedItem>,
}

pub type SourceResult = std::result::Result<SourceFeed, SourceError>;

pub struct FeedSynchronizer {
    http: Arc<dyn HttpClient>,
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    cache: FeedCache,
    archive: ArchiveStore,
    default_order: Option<Vec<String>>,
}

impl FeedSynchronizer {
    pub fn new(http: Arc<dyn HttpClient>, store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(http, store, clock, &CacheConfig::default())
    }

    pub fn with_config(
        http: Arc<dyn HttpClient>,
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        config: &CacheConfig,
    ) -> Self {
        let cache = FeedCache::with_ttl(
            store.clone(),
            clock.clone(),
            chrono::Duration::minutes(config.feed_ttl_minutes),
        );
        let archive =
            ArchiveStore::with_limit(store.clone(), clock.clone(), config.max_archive_items);
        Self {
            http,
            store,
            clock,
            cache,
            archive,
            default_order: None,
        }
    }

    /// Order used when no order has been saved yet.
    pub fn with_default_order(mut self, order: Option<Vec<String>>) -> Self {
        self.default_order = order;
        self
    }

    /// `sources` arranged by the saved order, else the default order, with
    /// unmentioned feeds appended in their configured order.
    pub async fn ordered_sources(&self, sources: &[FeedSource]) -> Result<Vec<FeedSource>> {
        let saved: Option<Vec<String>> = storage::load(self.store.as_ref(), FEED_ORDER_KEY).await?;
        let order = saved.or_else(|| self.default_order.clone());
        Ok(order_sources(sources, order.as_deref()))
    }

    pub async fn save_order(&self, ids: &[String]) -> Result<()> {
        storage::save(self.store.as_ref(), FEED_ORDER_KEY, ids).await
    }

    /// Refresh `sources`, returning one result per source in input order.
    ///
    /// `force_refresh` drops every source's cache entry first.
    pub async fn refresh(&self, sources: &[FeedSource], force_refresh: bool) -> Vec<SourceResult> {
        if force_refresh {
            let urls: Vec<&str> = sources.iter().map(|s| s.url.as_str()).collect();
            if let Err(e) = self.cache.invalidate(&urls).await {
                tracing::warn!(error = %e, "Failed to invalidate feed cache");
            }
        }

        let results = join_all(sources.iter().map(|feed| self.refresh_one(feed))).await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        tracing::info!(
            sources = sources.len(),
            failed,
            force_refresh,
            "Feed refresh complete"
        );
        results
    }

    /// [`ordered_sources`](Self::ordered_sources) then [`refresh`](Self::refresh).
    pub async fn refresh_ordered(
        &self,
        sources: &[FeedSource],
        force_refresh: bool,
    ) -> Vec<SourceResult> {
        let ordered = match self.ordered_sources(sources).await {
            Ok(ordered) => ordered,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read saved feed order");
                order_sources(sources, self.default_order.as_deref())
            }
        };
        self.refresh(&ordered, force_refresh).await
    }

    async fn refresh_one(&self, feed: &FeedSource) -> SourceResult {
        let outcome = async {
            let live = self.fetch_or_cache(feed).await?;
            self.archive.merge_and_persist(&feed.id, live).await
        }
        .await;

        match outcome {
            Ok(items) => Ok(SourceFeed {
                feed: feed.clone(),
                items,
            }),
            Err(error) => {
                tracing::warn!(feed = %feed.name, url = %feed.url, error = %error, "Feed refresh failed");
                Err(SourceError {
                    feed: feed.clone(),
                    error,
                })
            }
        }
    }

    async fn fetch_or_cache(&self, feed: &FeedSource) -> Result<Vec<FeedItem>> {
        if let Some(items) = self.cache.get(&feed.url).await? {
            tracing::debug!(url = %feed.url, items = items.len(), "Feed cache hit");
            return Ok(items);
        }

        tracing::debug!(url = %feed.url, "Feed cache miss, fetching");
        let body = self.http.get_text(&feed.url).await?;
        let items = parse_document(body.as_bytes(), &feed.url, self.clock.now())?;
        self.cache.put(&feed.url, &items).await?;
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::source::COMMENTS_ICON;
    use crate::storage::MemoryStore;
    use crate::test_support::{FakeHttp, ManualClock};
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn rss(items: &[(&str, &str)]) -> String {
        let body: String = items
            .iter()
            .map(|(link, comments)| {
                format!(
                    "<item><title>{link}</title><link>{link}</link>\
                     <pubDate>Thu, 01 Jan 2026 08:00:00 +0000</pubDate>\
                     <description>Points: 1 Comments: {comments}</description></item>"
                )
            })
            .collect();
        format!(
            r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title><link>https://x</link><description>d</description>{body}</channel></rss>"#
        )
    }

    fn sources() -> Vec<FeedSource> {
        vec![
            FeedSource::new("1", "One", "https://one.example/rss", "#111111"),
            FeedSource::new("2", "Two", "https://two.example/rss", "#222222"),
            FeedSource::new("3", "Three", "https://three.example/rss", "#333333"),
        ]
    }

    struct Harness {
        http: Arc<FakeHttp>,
        clock: Arc<ManualClock>,
        sync: FeedSynchronizer,
    }

    fn harness(http: FakeHttp) -> Harness {
        crate::logging::init_test();
        let http = Arc::new(http);
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
        ));
        let sync = FeedSynchronizer::new(http.clone(), Arc::new(MemoryStore::new()), clock.clone());
        Harness { http, clock, sync }
    }

    #[tokio::test]
    async fn failing_source_does_not_affect_siblings() {
        let h = harness(
            FakeHttp::new()
                .with_text("https://one.example/rss", rss(&[("https://one.example/a", "1")]))
                .with_unreachable("https://two.example/rss")
                .with_text("https://three.example/rss", rss(&[("https://three.example/a", "3")])),
        );

        let results = h.sync.refresh(&sources(), false).await;

        assert_eq!(results.len(), 3);
        let first = results[0].as_ref().unwrap();
        assert_eq!(first.feed.id, "1");
        assert_eq!(first.items.len(), 1);

        let failure = results[1].as_ref().unwrap_err();
        assert_eq!(failure.feed.id, "2");
        assert!(matches!(failure.error, Error::Fetch { .. }));

        assert_eq!(results[2].as_ref().unwrap().feed.id, "3");
    }

    #[tokio::test]
    async fn bad_status_and_unparsable_body_are_typed_failures() {
        let h = harness(
            FakeHttp::new()
                .with_status("https://one.example/rss", 503)
                .with_text("https://two.example/rss", "<html>nope</html>"),
        );

        let results = h.sync.refresh(&sources()[..2], false).await;

        let first = results[0].as_ref().unwrap_err();
        assert!(matches!(first.error, Error::Fetch { status: Some(503), .. }));
        let second = results[1].as_ref().unwrap_err();
        assert!(matches!(second.error, Error::Parse { .. }));
    }

    #[tokio::test]
    async fn cached_feed_is_not_refetched_but_still_merged() {
        let h = harness(
            FakeHttp::new().with_text("https://one.example/rss", rss(&[("https://one.example/a", "1")])),
        );
        let one = &sources()[..1];

        h.sync.refresh(one, false).await;
        h.clock.advance(Duration::minutes(5));
        let results = h.sync.refresh(one, false).await;

        assert_eq!(h.http.get_count("https://one.example/rss"), 1);
        assert_eq!(results[0].as_ref().unwrap().items.len(), 1);
    }

    #[tokio::test]
    async fn force_refresh_bypasses_cache() {
        let h = harness(
            FakeHttp::new().with_text("https://one.example/rss", rss(&[("https://one.example/a", "1")])),
        );
        let one = &sources()[..1];

        h.sync.refresh(one, false).await;
        h.sync.refresh(one, true).await;

        assert_eq!(h.http.get_count("https://one.example/rss"), 2);
    }

    #[tokio::test]
    async fn expired_cache_refetches_and_live_counts_win() {
        let hn = FeedSource::new("hn", "Hacker News", "https://hnrss.org/frontpage", "#ff6600");
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()));

        let first = FeedSynchronizer::new(
            Arc::new(FakeHttp::new().with_text(&hn.url, rss(&[("https://story.example/a", "5")]))),
            store.clone(),
            clock.clone(),
        );
        first.refresh(std::slice::from_ref(&hn), false).await;

        // Same story with fresher counts, plus one new story.
        let http = Arc::new(FakeHttp::new().with_text(
            &hn.url,
            rss(&[("https://story.example/a", "9"), ("https://story.example/b", "0")]),
        ));
        let second = FeedSynchronizer::new(http.clone(), store, clock.clone());
        clock.advance(Duration::minutes(11));

        let results = second.refresh(std::slice::from_ref(&hn), false).await;
        let items = &results[0].as_ref().unwrap().items;

        assert_eq!(http.get_count(&hn.url), 1, "expired entry refetched");
        assert_eq!(items.len(), 2);
        let story = items.iter().find(|i| i.link == "https://story.example/a").unwrap();
        assert_eq!(story.meta_value(COMMENTS_ICON), Some("9"));
    }

    #[tokio::test]
    async fn stories_leaving_the_live_window_stay_archived() {
        let url = "https://one.example/rss";
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()));

        let first = FeedSynchronizer::new(
            Arc::new(FakeHttp::new().with_text(url, rss(&[("https://one.example/old", "1")]))),
            store.clone(),
            clock.clone(),
        );
        first.refresh(&sources()[..1], false).await;

        let second = FeedSynchronizer::new(
            Arc::new(FakeHttp::new().with_text(url, rss(&[("https://one.example/new", "1")]))),
            store,
            clock,
        );
        let results = second.refresh(&sources()[..1], true).await;

        let links: Vec<&str> = results[0]
            .as_ref()
            .unwrap()
            .items
            .iter()
            .map(|i| i.link.as_str())
            .collect();
        assert!(links.contains(&"https://one.example/old"));
        assert!(links.contains(&"https://one.example/new"));
    }

    #[tokio::test]
    async fn saved_order_beats_default_order() {
        let h = harness(FakeHttp::new());
        let sync = h.sync.with_default_order(Some(vec!["2".into()]));

        let ids = |v: Vec<FeedSource>| v.into_iter().map(|s| s.id).collect::<Vec<_>>();
        assert_eq!(ids(sync.ordered_sources(&sources()).await.unwrap()), vec!["2", "1", "3"]);

        sync.save_order(&["3".into(), "1".into()]).await.unwrap();
        assert_eq!(ids(sync.ordered_sources(&sources()).await.unwrap()), vec!["3", "1", "2"]);

        let results = sync.refresh_ordered(&sources(), false).await;
        let order: Vec<&str> = results
            .iter()
            .map(|r| match r {
                Ok(feed) => feed.feed.id.as_str(),
                Err(e) => e.feed.id.as_str(),
            })
            .collect();
        assert_eq!(order, vec!["3", "1", "2"]);
    }
}
