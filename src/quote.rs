//! Quote of the day.
//!
//! Two public endpoints are tried in order; the first answer is cached for
//! an hour. When both fail a built-in quote is shown, so this never errors.

use std::sync::Arc;

use chrono::Duration;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock::Clock;
use crate::http::HttpClient;
use crate::source::CacheEntry;
use crate::storage::{self, KvStore};

pub const QUOTE_CACHE_KEY: &str = "cachedQuote";
pub const QUOTE_CACHE_TTL_MINUTES: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub text: String,
    pub author: String,
}

impl Quote {
    fn new(text: &str, author: &str) -> Self {
        Self {
            text: text.to_string(),
            author: author.to_string(),
        }
    }
}

/// The endpoints, each with its own response shape.
#[derive(Debug, Clone, Copy)]
enum QuoteApi {
    Quotable,
    UselessFacts,
}

impl QuoteApi {
    const ALL: [QuoteApi; 2] = [QuoteApi::Quotable, QuoteApi::UselessFacts];

    fn url(self) -> &'static str {
        match self {
            QuoteApi::Quotable => "https://api.quotable.io/random?maxLength=120",
            QuoteApi::UselessFacts => "https://uselessfacts.jsph.pl/random.json?language=en",
        }
    }

    fn parse(self, data: &Value) -> Option<Quote> {
        match self {
            QuoteApi::Quotable => Some(Quote::new(
                data.get("content")?.as_str()?,
                data.get("author")?.as_str()?,
            )),
            QuoteApi::UselessFacts => Some(Quote::new(data.get("text")?.as_str()?, "Useless Fact")),
        }
    }
}

const FALLBACK_QUOTES: [(&str, &str); 5] = [
    ("The only way to do great work is to love what you do.", "Steve Jobs"),
    ("Simplicity is the ultimate sophistication.", "Leonardo da Vinci"),
    ("First, solve the problem. Then, write the code.", "John Johnson"),
    ("Code is like humor. When you have to explain it, it's bad.", "Cory House"),
    ("The best error message is the one that never shows up.", "Thomas Fuchs"),
];

pub fn fallback_quote() -> Quote {
    let (text, author) = FALLBACK_QUOTES[rand::rng().random_range(0..FALLBACK_QUOTES.len())];
    Quote::new(text, author)
}

pub struct QuoteService {
    http: Arc<dyn HttpClient>,
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
}

impl QuoteService {
    pub fn new(http: Arc<dyn HttpClient>, store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self { http, store, clock }
    }

    /// Cached quote if younger than an hour (unless `force_new`), else a
    /// freshly fetched one, else a fallback.
    pub async fn quote(&self, force_new: bool) -> Quote {
        if !force_new {
            if let Some(cached) = self.cached().await {
                return cached;
            }
        }

        for api in QuoteApi::ALL {
            let quote = match self.http.get_text(api.url()).await {
                Ok(body) => serde_json::from_str::<Value>(&body)
                    .ok()
                    .and_then(|data| api.parse(&data)),
                Err(e) => {
                    tracing::debug!(api = ?api, error = %e, "Quote endpoint failed");
                    None
                }
            };
            if let Some(quote) = quote {
                let entry = CacheEntry::new(&quote, self.clock.now());
                if let Err(e) = storage::save(self.store.as_ref(), QUOTE_CACHE_KEY, &entry).await {
                    tracing::warn!(error = %e, "Failed to cache quote");
                }
                return quote;
            }
        }

        fallback_quote()
    }

    async fn cached(&self) -> Option<Quote> {
        let entry: CacheEntry<Quote> = storage::load(self.store.as_ref(), QUOTE_CACHE_KEY)
            .await
            .ok()
            .flatten()?;
        entry
            .is_fresh(self.clock.now(), Duration::minutes(QUOTE_CACHE_TTL_MINUTES))
            .then_some(entry.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::test_support::{FakeHttp, ManualClock};
    use chrono::{TimeZone, Utc};

    const QUOTABLE: &str = "https://api.quotable.io/random?maxLength=120";
    const FACTS: &str = "https://uselessfacts.jsph.pl/random.json?language=en";

    fn service(http: FakeHttp) -> (QuoteService, Arc<FakeHttp>, Arc<ManualClock>) {
        let http = Arc::new(http);
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 2, 2, 8, 0, 0).unwrap(),
        ));
        let svc = QuoteService::new(http.clone(), Arc::new(MemoryStore::new()), clock.clone());
        (svc, http, clock)
    }

    #[tokio::test]
    async fn first_endpoint_answer_is_used_and_cached() {
        let (svc, http, clock) = service(
            FakeHttp::new().with_text(QUOTABLE, r#"{"content":"Stay hungry.","author":"Someone"}"#),
        );

        assert_eq!(svc.quote(false).await, Quote::new("Stay hungry.", "Someone"));
        clock.advance(Duration::minutes(59));
        assert_eq!(svc.quote(false).await, Quote::new("Stay hungry.", "Someone"));
        assert_eq!(http.get_count(QUOTABLE), 1, "second read served from cache");

        svc.quote(true).await;
        assert_eq!(http.get_count(QUOTABLE), 2, "force_new skips the cache");
    }

    #[tokio::test]
    async fn cached_quote_expires_after_an_hour() {
        let (svc, http, clock) = service(
            FakeHttp::new().with_text(QUOTABLE, r#"{"content":"Ship it.","author":"Someone"}"#),
        );

        svc.quote(false).await;
        clock.advance(Duration::minutes(QUOTE_CACHE_TTL_MINUTES));
        assert_eq!(svc.quote(false).await, Quote::new("Ship it.", "Someone"));
        assert_eq!(http.get_count(QUOTABLE), 2, "stale at exactly 60 minutes");
    }

    #[tokio::test]
    async fn falls_through_to_second_endpoint() {
        let (svc, _http, _clock) = service(
            FakeHttp::new()
                .with_status(QUOTABLE, 500)
                .with_text(FACTS, r#"{"text":"Honey never spoils."}"#),
        );
        assert_eq!(
            svc.quote(false).await,
            Quote::new("Honey never spoils.", "Useless Fact")
        );
    }

    #[tokio::test]
    async fn total_failure_yields_fallback() {
        let (svc, _http, _clock) =
            service(FakeHttp::new().with_text(QUOTABLE, "not json").with_unreachable(FACTS));

        let quote = svc.quote(false).await;
        assert!(FALLBACK_QUOTES
            .iter()
            .any(|(text, author)| quote.text == *text && quote.author == *author));
    }
}
