//! livescroll-digest core: feed synchronization with a durable archive, and
//! streamed article summaries and chat over several completion providers.
//!
//! ```text
//! FeedSynchronizer::refresh
//!   └─ per feed, concurrently:
//!        FeedCache ─(miss)─► HttpClient ─► parser ─► ArchiveStore
//!
//! CompletionOrchestrator::summarize_article / chat
//!   SummaryCache ─(miss)─► load_article ─► Provider stream ─► on_chunk
//! ```
//!
//! Every persistent record lives in a [`storage::KvStore`]; every network
//! call goes through [`http::HttpClient`]; time comes from [`clock::Clock`].

pub mod article;
pub mod clock;
pub mod completion;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod quote;
pub mod source;
pub mod storage;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use clock::{Clock, SystemClock};
pub use completion::{CompletionOrchestrator, CompletionSettings, Provider};
pub use config::Config;
pub use error::{Error, Result, SourceError};
pub use source::{FeedItem, FeedSource};
pub use sync::{FeedSynchronizer, SourceFeed, SourceResult};
