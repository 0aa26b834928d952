//! The core data type shared across all feeds.
//!
//! `FeedItem` represents a single entry from either feed dialect. The parser
//! converts RSS items and Atom entries into `FeedItem`s so that caching,
//! archiving and rendering stay dialect-agnostic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const POINTS_ICON: &str = "▲";
pub const COMMENTS_ICON: &str = "💬";
pub const AUTHOR_ICON: &str = "✍";
pub const CATEGORY_ICON: &str = "🏷";

/// One small piece of display metadata, e.g. `▲ 120` or `✍ Jane`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct MetaTag {
    pub icon: String,
    pub value: String,
}

impl MetaTag {
    pub fn new(icon: &str, value: impl Into<String>) -> Self {
        Self {
            icon: icon.to_string(),
            value: value.into(),
        }
    }
}

/// A single feed entry, normalised from either dialect.
///
/// Identity is [`link`](FeedItem::link): two items with the same link are
/// the same story, and a fresher record replaces an older one entirely.
///
/// The relative age label ("3h", "2d") is never stored; it is derived from
/// `published` at render time via [`display_age`](FeedItem::display_age).
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    /// Human-readable headline.
    pub title: String,

    /// URL to the full content; the de-duplication key.
    pub link: String,

    /// Publication timestamp as the feed states it.
    pub published: Option<DateTime<Utc>>,

    /// When an undated item was first parsed. Orders it in place of
    /// `published` so it ages like any other story.
    #[serde(default)]
    pub seen_at: Option<DateTime<Utc>>,

    /// Ordered display tags (points, comments, author, category).
    #[serde(default)]
    pub meta: Vec<MetaTag>,

    /// Discussion thread, when the feed exposes one.
    #[serde(default)]
    pub comments_link: Option<String>,
}

impl FeedItem {
    /// Timestamp used for ordering: `published`, else `seen_at`, else `now`.
    pub fn sort_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.published.or(self.seen_at).unwrap_or(now)
    }

    /// Coarse relative age: `now`, `Nh`, `Nd`, or an absolute `Jan 5`.
    /// Undated items get an empty label.
    pub fn display_age(&self, now: DateTime<Utc>) -> String {
        let Some(published) = self.published else {
            return String::new();
        };
        let hours = (now - published).num_hours();
        if hours < 1 {
            return "now".into();
        }
        if hours < 24 {
            return format!("{hours}h");
        }
        let days = hours / 24;
        if days < 7 {
            return format!("{days}d");
        }
        published.format("%b %-d").to_string()
    }

    /// Value of the first tag with this icon.
    pub fn meta_value(&self, icon: &str) -> Option<&str> {
        self.meta
            .iter()
            .find(|tag| tag.icon == icon)
            .map(|tag| tag.value.as_str())
    }
}

/// Sort newest first by [`FeedItem::sort_time`]. The sort is stable so
/// equal timestamps keep their incoming order.
pub fn sort_newest_first(items: &mut [FeedItem], now: DateTime<Utc>) {
    items.sort_by(|a, b| b.sort_time(now).cmp(&a.sort_time(now)));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    /// Shorthand constructor for tests.
    pub fn make_item(link: &str, published: Option<DateTime<Utc>>) -> FeedItem {
        FeedItem {
            title: format!("Title {link}"),
            link: link.to_string(),
            published,
            seen_at: None,
            meta: Vec::new(),
            comments_link: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 20, 12, 0, 0).unwrap()
    }

    #[test]
    fn sort_reverse_chronological() {
        let old = make_item("1", Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        let mid = make_item("2", Some(Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()));
        let new = make_item("3", Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()));

        let mut items = vec![old, new, mid];
        sort_newest_first(&mut items, now());

        assert_eq!(items[0].link, "3", "newest first");
        assert_eq!(items[1].link, "2");
        assert_eq!(items[2].link, "1", "oldest last");
    }

    #[test]
    fn undated_items_sort_as_now() {
        let yesterday = make_item("dated", Some(now() - Duration::days(1)));
        let undated = make_item("undated", None);

        let mut items = vec![yesterday, undated];
        sort_newest_first(&mut items, now());

        assert_eq!(items[0].link, "undated", "undated counts as now");
        assert_eq!(items[1].link, "dated");
    }

    #[test]
    fn undated_items_order_by_first_seen() {
        let mut stale = make_item("stale", None);
        stale.seen_at = Some(now() - Duration::days(30));
        let fresh = make_item("fresh", Some(now() - Duration::hours(1)));

        let mut items = vec![stale, fresh];
        sort_newest_first(&mut items, now());

        assert_eq!(items[0].link, "fresh");
        assert_eq!(items[1].link, "stale", "a month-old sighting is old");
        assert_eq!(items[1].display_age(now()), "", "still no age label");
    }

    #[test]
    fn equal_timestamps_keep_incoming_order() {
        let ts = Some(now());
        let mut items = vec![make_item("a", ts), make_item("b", ts)];
        sort_newest_first(&mut items, now());
        assert_eq!(items[0].link, "a");
        assert_eq!(items[1].link, "b");
    }

    #[test]
    fn display_age_buckets() {
        let at = |d: Duration| make_item("x", Some(now() - d));

        assert_eq!(at(Duration::minutes(59)).display_age(now()), "now");
        assert_eq!(at(Duration::hours(3)).display_age(now()), "3h");
        assert_eq!(at(Duration::hours(23)).display_age(now()), "23h");
        assert_eq!(at(Duration::hours(49)).display_age(now()), "2d");
        assert_eq!(at(Duration::days(10)).display_age(now()), "Mar 10");
        assert_eq!(make_item("x", None).display_age(now()), "");
    }

    #[test]
    fn future_dates_read_as_now() {
        let item = make_item("x", Some(now() + Duration::hours(5)));
        assert_eq!(item.display_age(now()), "now");
    }

    #[test]
    fn display_age_is_recomputed_per_call() {
        let item = make_item("x", Some(now()));
        assert_eq!(item.display_age(now()), "now");
        assert_eq!(item.display_age(now() + Duration::hours(2)), "2h");
    }

    #[test]
    fn meta_value_finds_first_matching_tag() {
        let mut item = make_item("x", None);
        item.meta = vec![MetaTag::new(POINTS_ICON, "12"), MetaTag::new(COMMENTS_ICON, "4")];
        assert_eq!(item.meta_value(COMMENTS_ICON), Some("4"));
        assert_eq!(item.meta_value(AUTHOR_ICON), None);
    }
}
