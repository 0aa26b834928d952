//! Streaming text completion across four providers.
//!
//! ```text
//! summarize / chat ──► select_provider ──► Provider::build_request
//!        │                                      │
//!        │                              HttpClient::post_stream
//!        │                                      │
//!        │                     LineBuffer ──► Provider::decode_payload
//!        │                                      │
//!        ◄──────────── on_chunk(delta) ◄────────┘
//!        │
//!   SummaryCache (final text and chat transcript only)
//! ```
//!
//! Providers are a closed set ([`Provider`]); each variant knows its own
//! endpoint, auth headers, request body and streamed delta shape.

pub mod cache;
pub mod orchestrator;
pub mod provider;
pub mod settings;
pub mod stream;

pub use cache::{SummaryCache, SummaryRecord, SUMMARY_CACHE_KEY, SUMMARY_CACHE_LIMIT};
pub use orchestrator::{select_provider, ArticleContext, CompletionOrchestrator, SummaryOutcome};
pub use provider::{Provider, StreamEvent};
pub use settings::{CompletionSettings, ProviderSettings};
pub use stream::{stream_complete, LineBuffer};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Everything a provider needs besides credentials: a system instruction
/// and the ordered turns. A one-shot summary is a single user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub messages: Vec<ChatMessage>,
}

/// Output tokens requested from every provider.
pub const MAX_OUTPUT_TOKENS: u32 = 1024;
