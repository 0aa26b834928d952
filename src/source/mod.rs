//! Feed sources and everything between a feed URL and a merged item list.
//!
//! - [`feed_item`]: the normalised [`FeedItem`] type.
//! - [`parser`]: raw document bytes into items (RSS or Atom).
//! - [`cache`]: short-lived parsed-item cache keyed by feed URL.
//! - [`archive`]: durable, bounded per-feed history.
//!
//! The [`crate::sync`] module ties them together.

pub mod archive;
pub mod cache;
mod feed_item;
pub mod parser;

pub use archive::{merge, ArchiveStore, MAX_ARCHIVE_ITEMS};
pub use cache::{CacheEntry, FeedCache, FEED_CACHE_TTL_MINUTES};
pub use feed_item::{
    sort_newest_first, FeedItem, MetaTag, AUTHOR_ICON, CATEGORY_ICON, COMMENTS_ICON, POINTS_ICON,
};
pub use parser::{parse_document, SourceShape};

use serde::{Deserialize, Serialize};

/// A configured feed. Owned by configuration; the synchronizer only reads it.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct FeedSource {
    /// Stable identifier, used for ordering and archive keys.
    pub id: String,
    pub name: String,
    pub url: String,
    /// Brand color as `#rrggbb`.
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_color() -> String {
    "#6366f1".to_string()
}

impl FeedSource {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            color: color.into(),
        }
    }

    pub fn shape(&self) -> SourceShape {
        SourceShape::for_url(&self.url)
    }

    /// Brand color as RGB, falling back to indigo for malformed values.
    pub fn rgb(&self) -> (u8, u8, u8) {
        let hex = self.color.trim_start_matches('#');
        let channel = |i: usize| {
            hex.get(i..i + 2)
                .and_then(|h| u8::from_str_radix(h, 16).ok())
        };
        match (hex.len(), channel(0), channel(2), channel(4)) {
            (6, Some(r), Some(g), Some(b)) => (r, g, b),
            _ => (99, 102, 241),
        }
    }
}

/// Feeds used when the configuration lists none.
pub fn default_feeds() -> Vec<FeedSource> {
    vec![
        FeedSource::new("1", "Hacker News", "https://hnrss.org/frontpage", "#ff6600"),
        FeedSource::new(
            "2",
            "Simon Willison",
            "https://simonwillison.net/atom/everything/",
            "#3b82f6",
        ),
        FeedSource::new("3", "TechCrunch", "https://techcrunch.com/feed/", "#0a9c00"),
        FeedSource::new(
            "4",
            "MIT AI News",
            "https://news.mit.edu/rss/topic/artificial-intelligence2",
            "#a31f34",
        ),
    ]
}

/// Arrange `sources` by `custom_order` (a list of ids), then append every
/// source the custom order does not mention, in their original order.
///
/// Unknown and repeated ids in `custom_order` are skipped.
pub fn order_sources(sources: &[FeedSource], custom_order: Option<&[String]>) -> Vec<FeedSource> {
    let Some(order) = custom_order else {
        return sources.to_vec();
    };

    let mut ordered: Vec<FeedSource> = Vec::with_capacity(sources.len());
    for id in order {
        if ordered.iter().any(|s| &s.id == id) {
            continue;
        }
        if let Some(source) = sources.iter().find(|s| &s.id == id) {
            ordered.push(source.clone());
        }
    }
    for source in sources {
        if !order.contains(&source.id) {
            ordered.push(source.clone());
        }
    }
    ordered
}
