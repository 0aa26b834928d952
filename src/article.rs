//! Article text for summarization.
//!
//! Extraction sits behind [`ArticleExtractor`] so a full reader-mode
//! implementation can replace the paragraph heuristic in
//! [`ParagraphExtractor`].

use scraper::{ElementRef, Html, Selector};

use crate::error::{Error, Result};
use crate::http::HttpClient;

/// Characters of article text sent to a provider.
pub const MAX_ARTICLE_CHARS: usize = 12_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArticle {
    pub title: Option<String>,
    /// Inner HTML of the readable region.
    pub content: String,
    /// Plain text of the readable region.
    pub text_content: String,
}

pub trait ArticleExtractor: Send + Sync {
    /// `None` when the page has no readable content.
    fn extract(&self, html: &str) -> Option<ExtractedArticle>;
}

/// Takes the first of `<article>`, `<main>`, `<body>` and keeps its
/// headings, paragraphs and list items.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParagraphExtractor;

impl ArticleExtractor for ParagraphExtractor {
    fn extract(&self, html: &str) -> Option<ExtractedArticle> {
        let document = Html::parse_document(html);
        let title_selector = Selector::parse("title").ok()?;
        let block_selector = Selector::parse("h1, h2, h3, h4, p, li, pre, blockquote").ok()?;

        let root = ["article", "main", "body"].iter().find_map(|tag| {
            let selector = Selector::parse(tag).ok()?;
            document.select(&selector).next()
        })?;

        let blocks: Vec<String> = root
            .select(&block_selector)
            .filter(|el| !has_block_ancestor_within(el, &root))
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .filter(|text| !text.is_empty())
            .collect();
        if blocks.is_empty() {
            return None;
        }

        let title = document
            .select(&title_selector)
            .next()
            .map(|t| collapse_whitespace(&t.text().collect::<String>()))
            .filter(|t| !t.is_empty());

        Some(ExtractedArticle {
            title,
            content: root.inner_html(),
            text_content: blocks.join("\n\n"),
        })
    }
}

/// Skip `<p>` inside `<li>` and the like so text is not repeated.
fn has_block_ancestor_within(el: &ElementRef<'_>, root: &ElementRef<'_>) -> bool {
    el.ancestors()
        .take_while(|node| node.id() != root.id())
        .filter_map(ElementRef::wrap)
        .any(|ancestor| {
            matches!(
                ancestor.value().name(),
                "h1" | "h2" | "h3" | "h4" | "p" | "li" | "pre" | "blockquote"
            )
        })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// Fetch `url`, extract its readable text and cut it to
/// [`MAX_ARTICLE_CHARS`].
pub async fn load_article(
    http: &dyn HttpClient,
    extractor: &dyn ArticleExtractor,
    url: &str,
) -> Result<String> {
    let html = http.get_text(url).await?;
    let article = extractor
        .extract(&html)
        .filter(|a| !a.text_content.trim().is_empty())
        .ok_or_else(|| Error::parse(format!("article {url}"), "no readable text"))?;

    let text = truncate_chars(&article.text_content, MAX_ARTICLE_CHARS);
    tracing::debug!(url, chars = text.chars().count(), "Article extracted");
    Ok(text.to_string())
}
