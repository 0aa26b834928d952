//! Feed document parsing.
//!
//! Two dialects are understood: RSS (`<item>` containers, read with the
//! [`rss`] crate) and Atom (`<entry>` containers, read with [`feed_rs`]).
//! The first dialect that yields entries wins.
//!
//! Per-source metadata comes in exactly two shapes, see [`SourceShape`].
//! Missing fields degrade to defaults instead of failing the whole document:
//! no title becomes [`UNTITLED`], no link becomes [`MISSING_LINK`], and an
//! unreadable date leaves `published` empty with `seen_at` set to the parse
//! time.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use super::feed_item::{AUTHOR_ICON, CATEGORY_ICON, COMMENTS_ICON, POINTS_ICON};
use super::{FeedItem, MetaTag};
use crate::error::{Error, Result};

/// Entries read per document, in document order.
pub const MAX_PARSED_ITEMS: usize = 50;

pub const UNTITLED: &str = "Untitled";

/// Link used when an entry has none.
pub const MISSING_LINK: &str = "#";

static POINTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Points:\s*(\d+)").expect("valid points regex"));
static COMMENTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Comments:\s*(\d+)").expect("valid comments regex"));

/// How metadata is pulled out of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceShape {
    /// hnrss.org: points and comment counts live in the description text,
    /// and `<comments>` links the discussion thread.
    HackerNews,
    /// Everything else: author plus the first category.
    Generic,
}

impl SourceShape {
    pub fn for_url(url: &str) -> Self {
        if url.contains("hnrss.org") {
            SourceShape::HackerNews
        } else {
            SourceShape::Generic
        }
    }
}

/// Parse a raw feed document fetched from `feed_url`.
///
/// Only a document that is neither RSS nor Atom is an error; a valid feed
/// with no entries parses to an empty list. Undated entries are stamped
/// with `now`.
pub fn parse_document(
    body: &[u8],
    feed_url: &str,
    now: DateTime<Utc>,
) -> Result<Vec<FeedItem>> {
    let shape = SourceShape::for_url(feed_url);

    let rss_error = match rss::Channel::read_from(body) {
        Ok(channel) if !channel.items().is_empty() => {
            return Ok(stamp_undated(parse_channel(&channel, shape), now));
        }
        Ok(_) => None,
        Err(e) => Some(e),
    };

    match feed_rs::parser::parse(body) {
        Ok(feed) => Ok(stamp_undated(parse_atom(feed, shape), now)),
        Err(atom_error) => match rss_error {
            // An empty RSS channel is still a valid feed.
            None => Ok(Vec::new()),
            Some(rss_error) => Err(Error::parse(
                format!("feed {feed_url}"),
                format!("not RSS ({rss_error}) and not Atom ({atom_error})"),
            )),
        },
    }
}

fn stamp_undated(mut items: Vec<FeedItem>, now: DateTime<Utc>) -> Vec<FeedItem> {
    for item in items.iter_mut().filter(|i| i.published.is_none()) {
        item.seen_at = Some(now);
    }
    items
}

/// Parse an already-read [`rss::Channel`]. Pure, so tests can exercise it
/// without the network.
pub fn parse_channel(channel: &rss::Channel, shape: SourceShape) -> Vec<FeedItem> {
    channel
        .items()
        .iter()
        .take(MAX_PARSED_ITEMS)
        .map(|item| {
            // Prefer <link>, fall back to a permalink <guid>.
            let link = non_empty(item.link())
                .or_else(|| {
                    item.guid()
                        .filter(|g| g.is_permalink())
                        .and_then(|g| non_empty(Some(g.value())))
                })
                .unwrap_or(MISSING_LINK)
                .to_string();

            let published = item
                .pub_date()
                .and_then(parse_date)
                .or_else(|| {
                    item.dublin_core_ext()
                        .and_then(|dc| dc.dates().first())
                        .and_then(|d| parse_date(d))
                });

            let mut meta = Vec::new();
            let mut comments_link = None;
            match shape {
                SourceShape::HackerNews => {
                    hacker_news_meta(item.description().unwrap_or_default(), &mut meta);
                    comments_link = non_empty(item.comments()).map(String::from);
                }
                SourceShape::Generic => {
                    let author = item
                        .dublin_core_ext()
                        .and_then(|dc| dc.creators().first().map(String::as_str))
                        .and_then(|a| non_empty(Some(a)))
                        .or_else(|| non_empty(item.author()));
                    if let Some(author) = author {
                        meta.push(MetaTag::new(AUTHOR_ICON, author));
                    }
                    if let Some(category) = item
                        .categories()
                        .first()
                        .and_then(|c| non_empty(Some(c.name())))
                    {
                        meta.push(MetaTag::new(CATEGORY_ICON, category));
                    }
                }
            }

            FeedItem {
                title: non_empty(item.title()).unwrap_or(UNTITLED).to_string(),
                link,
                published,
                seen_at: None,
                meta,
                comments_link,
            }
        })
        .collect()
}

fn parse_atom(feed: feed_rs::model::Feed, shape: SourceShape) -> Vec<FeedItem> {
    feed.entries
        .into_iter()
        .take(MAX_PARSED_ITEMS)
        .map(|entry| {
            let link = entry
                .links
                .iter()
                .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
                .or_else(|| entry.links.first())
                .and_then(|l| non_empty(Some(l.href.as_str())))
                .unwrap_or(MISSING_LINK)
                .to_string();

            let mut meta = Vec::new();
            match shape {
                SourceShape::HackerNews => {
                    let text = entry
                        .summary
                        .as_ref()
                        .map(|s| s.content.as_str())
                        .unwrap_or_default();
                    hacker_news_meta(text, &mut meta);
                }
                SourceShape::Generic => {
                    if let Some(author) = entry
                        .authors
                        .first()
                        .and_then(|p| non_empty(Some(p.name.as_str())))
                    {
                        meta.push(MetaTag::new(AUTHOR_ICON, author));
                    }
                    if let Some(category) = entry.categories.first().and_then(|c| {
                        non_empty(c.label.as_deref()).or_else(|| non_empty(Some(c.term.as_str())))
                    }) {
                        meta.push(MetaTag::new(CATEGORY_ICON, category));
                    }
                }
            }

            FeedItem {
                title: entry
                    .title
                    .as_ref()
                    .and_then(|t| non_empty(Some(t.content.as_str())))
                    .unwrap_or(UNTITLED)
                    .to_string(),
                link,
                published: entry.published.or(entry.updated),
                seen_at: None,
                meta,
                comments_link: None,
            }
        })
        .collect()
}

/// Points and comment counts are extracted independently; either may be
/// missing.
fn hacker_news_meta(description: &str, meta: &mut Vec<MetaTag>) {
    if let Some(points) = POINTS_RE.captures(description).and_then(|c| c.get(1)) {
        meta.push(MetaTag::new(POINTS_ICON, points.as_str()));
    }
    if let Some(comments) = COMMENTS_RE.captures(description).and_then(|c| c.get(1)) {
        meta.push(MetaTag::new(COMMENTS_ICON, comments.as_str()));
    }
}

/// RFC-2822 as RSS specifies, RFC-3339 as many feeds actually send.
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    const GENERIC_URL: &str = "https://example.com/feed";
    const HN_URL: &str = "https://hnrss.org/frontpage";

    fn parsed_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap()
    }

    fn rss_doc(items: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>Test Feed</title>
    <link>https://example.com</link>
    <description>test</description>
    {items}
  </channel>
</rss>"#
        )
    }

    #[test]
    fn parse_rss_extracts_items() {
        let xml = rss_doc(
            r#"
    <item>
      <title>First Post</title>
      <link>https://example.com/1</link>
      <pubDate>Mon, 01 Jan 2024 00:00:00 +0000</pubDate>
      <dc:creator>Jane Doe</dc:creator>
      <category>Rust</category>
      <category>Ignored</category>
    </item>
    <item>
      <title>Second Post</title>
      <link>https://example.com/2</link>
      <author>bob@example.com (Bob)</author>
    </item>"#,
        );

        let items = parse_document(xml.as_bytes(), GENERIC_URL, parsed_at()).unwrap();
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].title, "First Post");
        assert_eq!(items[0].link, "https://example.com/1");
        assert_eq!(
            items[0].published,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            items[0].meta,
            vec![
                MetaTag::new(AUTHOR_ICON, "Jane Doe"),
                MetaTag::new(CATEGORY_ICON, "Rust"),
            ]
        );
        assert!(items[0].comments_link.is_none());

        assert_eq!(items[1].meta, vec![MetaTag::new(AUTHOR_ICON, "bob@example.com (Bob)")]);
        assert!(items[1].published.is_none());
    }

    #[test]
    fn parse_hacker_news_meta() {
        let xml = rss_doc(
            r#"
    <item>
      <title>Show HN: Thing</title>
      <link>https://thing.example</link>
      <description><![CDATA[<p>Article URL: https://thing.example</p><p>Points: 120</p><p># Comments: 45</p>]]></description>
      <comments>https://news.ycombinator.com/item?id=1</comments>
      <dc:creator>pg</dc:creator>
    </item>
    <item>
      <title>No counts yet</title>
      <link>https://quiet.example</link>
      <description>nothing here</description>
    </item>"#,
        );

        let items = parse_document(xml.as_bytes(), HN_URL, parsed_at()).unwrap();

        assert_eq!(
            items[0].meta,
            vec![MetaTag::new(POINTS_ICON, "120"), MetaTag::new(COMMENTS_ICON, "45")],
            "HN items carry counts, not author"
        );
        assert_eq!(
            items[0].comments_link.as_deref(),
            Some("https://news.ycombinator.com/item?id=1")
        );
        assert!(items[1].meta.is_empty());
    }

    #[test]
    fn parse_atom_entries() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Test</title>
  <id>urn:test</id>
  <updated>2025-02-01T10:00:00Z</updated>
  <entry>
    <title>Atom Post</title>
    <id>urn:test:1</id>
    <link href="https://atom.example/1" rel="alternate"/>
    <updated>2025-02-01T10:00:00Z</updated>
    <author><name>Simon</name></author>
    <category term="llms"/>
  </entry>
  <entry>
    <id>urn:test:2</id>
    <published>2025-01-15T08:30:00+01:00</published>
    <updated>2025-01-16T08:30:00Z</updated>
  </entry>
</feed>"#;

        let items = parse_document(xml.as_bytes(), GENERIC_URL, parsed_at()).unwrap();
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].title, "Atom Post");
        assert_eq!(items[0].link, "https://atom.example/1");
        assert_eq!(
            items[0].published,
            Some(Utc.with_ymd_and_hms(2025, 2, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(
            items[0].meta,
            vec![
                MetaTag::new(AUTHOR_ICON, "Simon"),
                MetaTag::new(CATEGORY_ICON, "llms"),
            ]
        );

        assert_eq!(items[1].title, UNTITLED);
        assert_eq!(items[1].link, MISSING_LINK);
        assert_eq!(
            items[1].published,
            Some(Utc.with_ymd_and_hms(2025, 1, 15, 7, 30, 0).unwrap()),
            "published preferred over updated"
        );
    }

    #[test]
    fn caps_entries_in_document_order() {
        let many: String = (0..80)
            .map(|i| format!("<item><title>Item {i}</title><link>https://example.com/{i}</link></item>"))
            .collect();
        let items = parse_document(rss_doc(&many).as_bytes(), GENERIC_URL, parsed_at()).unwrap();

        assert_eq!(items.len(), MAX_PARSED_ITEMS);
        assert_eq!(items[0].title, "Item 0");
        assert_eq!(items[49].title, "Item 49");
    }

    #[test]
    fn missing_fields_degrade_to_defaults() {
        let xml = rss_doc(
            r#"
    <item>
      <description>just text</description>
      <pubDate>not-a-real-date</pubDate>
    </item>
    <item>
      <title>   </title>
      <guid isPermaLink="true">https://example.com/permalink</guid>
    </item>"#,
        );

        let items = parse_document(xml.as_bytes(), GENERIC_URL, parsed_at()).unwrap();

        assert_eq!(items[0].title, UNTITLED);
        assert_eq!(items[0].link, MISSING_LINK);
        assert!(items[0].published.is_none());
        assert_eq!(items[0].seen_at, Some(parsed_at()), "undated entry stamped");

        assert_eq!(items[1].title, UNTITLED, "blank title counts as missing");
        assert_eq!(items[1].link, "https://example.com/permalink");
    }

    #[test]
    fn rfc3339_dates_in_rss_are_accepted() {
        let xml = rss_doc(
            r#"<item><title>T</title><link>https://e.x/1</link><pubDate>2025-05-01T12:00:00Z</pubDate></item>"#,
        );
        let items = parse_document(xml.as_bytes(), GENERIC_URL, parsed_at()).unwrap();
        assert_eq!(
            items[0].published,
            Some(Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(items[0].seen_at, None, "dated entries are not stamped");
    }

    #[test]
    fn empty_channel_is_not_an_error() {
        let items = parse_document(rss_doc("").as_bytes(), GENERIC_URL, parsed_at()).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let result =
            parse_document(b"<html><body>Not a feed</body></html>", GENERIC_URL, parsed_at());
        assert!(matches!(result, Err(Error::Parse { .. })));

        let result = parse_document(b"\x00\x01 nope", GENERIC_URL, parsed_at());
        assert!(matches!(result, Err(Error::Parse { .. })));
    }
}
