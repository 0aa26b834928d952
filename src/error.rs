//! Error types for the feed and completion core.

use thiserror::Error;

use crate::completion::Provider;
use crate::source::FeedSource;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum Error {
    /// Network error or non-2xx status on a feed, article or quote fetch.
    #[error("failed to fetch {url}: {reason}")]
    Fetch {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    /// A document could not be interpreted (feed dialect, article text).
    #[error("could not parse {what}: {reason}")]
    Parse { what: String, reason: String },

    /// No provider has a usable API key.
    #[error("no API key configured; add a Groq, Gemini, Anthropic or OpenAI key to the config")]
    CredentialMissing,

    /// Non-2xx before streaming, or an error payload reported by the provider.
    #[error("{provider} error: {message}")]
    Provider {
        provider: Provider,
        status: Option<u16>,
        message: String,
    },

    /// Persistent store failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn fetch(url: &str, reason: impl ToString) -> Self {
        Error::Fetch {
            url: url.to_string(),
            status: None,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn parse(what: impl Into<String>, reason: impl ToString) -> Self {
        Error::Parse {
            what: what.into(),
            reason: reason.to_string(),
        }
    }
}

/// A refresh failure for one feed, tagged with the feed it belongs to.
#[derive(Error, Debug)]
#[error("{}: {error}", feed.name)]
pub struct SourceError {
    pub feed: FeedSource,
    #[source]
    pub error: Error,
}

/// Result type alias for the library.
pub type Result<T> = std::result::Result<T, Error>;
