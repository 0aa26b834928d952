//! Provider selection, prompts and the summary/chat flows.

use std::sync::Arc;

use super::cache::SummaryCache;
use super::stream::stream_complete;
use super::{ChatMessage, CompletionSettings, Prompt, Provider};
use crate::article::{load_article, ArticleExtractor, ParagraphExtractor};
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::storage::KvStore;

const SUMMARY_SYSTEM: &str =
    "You summarize news articles for a busy reader. Be accurate and concise.";

/// The preferred provider when it has a key, otherwise the first keyed one
/// in [`Provider::PRIORITY`].
pub fn select_provider(settings: &CompletionSettings) -> Result<Provider> {
    if settings.credential(settings.provider).is_some() {
        return Ok(settings.provider);
    }
    Provider::PRIORITY
        .into_iter()
        .find(|p| settings.credential(*p).is_some())
        .ok_or(Error::CredentialMissing)
}

fn summary_prompt(text: &str, title: &str) -> Prompt {
    Prompt {
        system: SUMMARY_SYSTEM.to_string(),
        messages: vec![ChatMessage::user(format!(
            "Please provide a concise summary of the following article titled \"{title}\".\n\
             Format your response as:\n\
             1. A 2-3 sentence overview\n\
             2. 3-5 key bullet points\n\n\
             Article content:\n{text}"
        ))],
    }
}

fn chat_system(article: &ArticleContext) -> String {
    let (label, body) = match (&article.text, &article.summary) {
        (Some(text), _) => ("Article content", text.as_str()),
        (None, Some(summary)) => ("Article summary", summary.as_str()),
        (None, None) => ("Article content", "(unavailable)"),
    };
    format!(
        "You answer questions about the article titled \"{}\". \
         Base your answers on the article and say when it does not cover the question.\n\n\
         {label}:\n{body}",
        article.title
    )
}

/// What a chat turn is about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleContext {
    pub url: String,
    pub title: String,
    /// Extracted text, when it was loaded for this session.
    pub text: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryOutcome {
    pub summary: String,
    pub from_cache: bool,
    /// Ready to pass to [`CompletionOrchestrator::chat`].
    pub article: ArticleContext,
}

pub struct CompletionOrchestrator {
    http: Arc<dyn HttpClient>,
    extractor: Arc<dyn ArticleExtractor>,
    cache: SummaryCache,
}

impl CompletionOrchestrator {
    pub fn new(http: Arc<dyn HttpClient>, store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_cache(http, SummaryCache::new(store, clock))
    }

    pub fn with_cache(http: Arc<dyn HttpClient>, cache: SummaryCache) -> Self {
        Self {
            http,
            extractor: Arc::new(ParagraphExtractor),
            cache,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn ArticleExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn cache(&self) -> &SummaryCache {
        &self.cache
    }

    async fn complete(
        &self,
        prompt: &Prompt,
        settings: &CompletionSettings,
        on_chunk: &mut (dyn FnMut(&str) + Send),
    ) -> Result<String> {
        let provider = select_provider(settings)?;
        let credential = settings
            .credential(provider)
            .ok_or(Error::CredentialMissing)?;
        let model = settings.model(provider);
        tracing::info!(%provider, model, "Starting completion");
        stream_complete(self.http.as_ref(), provider, prompt, credential, model, on_chunk).await
    }

    /// Summarize already-extracted text. Nothing is cached.
    pub async fn summarize(
        &self,
        text: &str,
        title: &str,
        settings: &CompletionSettings,
        on_chunk: &mut (dyn FnMut(&str) + Send),
    ) -> Result<String> {
        self.complete(&summary_prompt(text, title), settings, on_chunk)
            .await
    }

    /// Summary of the article at `url`, from the cache when one was
    /// finished before. A fresh summary is cached only once its stream
    /// completes.
    pub async fn summarize_article(
        &self,
        url: &str,
        title: &str,
        settings: &CompletionSettings,
        on_chunk: &mut (dyn FnMut(&str) + Send),
    ) -> Result<SummaryOutcome> {
        match self.cache.get(url).await {
            Ok(Some(record)) if !record.summary.is_empty() => {
                tracing::debug!(url, "Summary served from cache");
                on_chunk(&record.summary);
                return Ok(SummaryOutcome {
                    article: ArticleContext {
                        url: url.to_string(),
                        title: title.to_string(),
                        text: None,
                        summary: Some(record.summary.clone()),
                    },
                    summary: record.summary,
                    from_cache: true,
                });
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(url, error = %e, "Summary cache unreadable"),
        }

        // Fail on a missing key before touching the network.
        select_provider(settings)?;
        let text = load_article(self.http.as_ref(), self.extractor.as_ref(), url).await?;
        let summary = self.summarize(&text, title, settings, on_chunk).await?;

        if !summary.is_empty() {
            if let Err(e) = self.cache.set_summary(url, &summary).await {
                tracing::warn!(url, error = %e, "Failed to cache summary");
            }
        }
        Ok(SummaryOutcome {
            article: ArticleContext {
                url: url.to_string(),
                title: title.to_string(),
                text: Some(text),
                summary: Some(summary.clone()),
            },
            summary,
            from_cache: false,
        })
    }

    /// Answer `question` about `article`, continuing its stored transcript.
    /// The turn is recorded only after the answer completes.
    pub async fn chat(
        &self,
        question: &str,
        article: &ArticleContext,
        settings: &CompletionSettings,
        on_chunk: &mut (dyn FnMut(&str) + Send),
    ) -> Result<String> {
        let history = match self.cache.get(&article.url).await {
            Ok(record) => record.map(|r| r.chat_history).unwrap_or_default(),
            Err(e) => {
                tracing::warn!(url = %article.url, error = %e, "Chat history unreadable");
                Vec::new()
            }
        };

        let mut messages = history;
        messages.push(ChatMessage::user(question));
        let prompt = Prompt {
            system: chat_system(article),
            messages,
        };

        let answer = self.complete(&prompt, settings, on_chunk).await?;
        self.cache
            .append_chat(
                &article.url,
                vec![ChatMessage::user(question), ChatMessage::assistant(answer.clone())],
            )
            .await?;
        Ok(answer)
    }
}
