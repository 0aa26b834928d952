//! Background work.
//!
//! A tokio task refreshes every feed on a timer and on demand, sending
//! results to the UI thread over a channel. Summaries and chat answers run
//! as their own tasks and stream chunks over the same channel, tagged with
//! the pane generation that asked for them.
//!
//! The UI thread never blocks on any of this: it drains the receiver with
//! `try_recv` once per tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use livescroll_digest::completion::{ArticleContext, SummaryOutcome};
use livescroll_digest::quote::{Quote, QuoteService};
use livescroll_digest::{
    CompletionOrchestrator, CompletionSettings, FeedSource, FeedSynchronizer, SourceResult,
};

use crate::app::Intent;

/// Messages sent from background tasks to the UI thread.
pub enum PollMsg {
    Feeds(Vec<SourceResult>),
    Quote(Quote),
    /// Streamed text for the pane with this generation.
    Chunk { generation: u64, text: String },
    SummaryDone {
        generation: u64,
        result: Result<SummaryOutcome, String>,
    },
    ChatDone {
        generation: u64,
        result: Result<String, String>,
    },
}

/// How often the poller re-fetches all sources.
const POLL_INTERVAL: Duration = Duration::from_secs(60);

enum PollCmd {
    Refresh { force: bool },
    SaveOrder(Vec<String>),
}

/// Handle the UI thread uses to start background work.
pub struct Worker {
    runtime: Handle,
    commands: mpsc::UnboundedSender<PollCmd>,
    messages: mpsc::UnboundedSender<PollMsg>,
    orchestrator: Arc<CompletionOrchestrator>,
    settings: Arc<CompletionSettings>,
}

/// Spawn the polling task.
///
/// Returns the [`Worker`] and a receiver that the main loop should drain on
/// every tick. Tasks stop on their own once the receiver is dropped.
pub fn spawn(
    runtime: Handle,
    sync: FeedSynchronizer,
    quotes: QuoteService,
    orchestrator: CompletionOrchestrator,
    sources: Vec<FeedSource>,
    settings: CompletionSettings,
) -> (Worker, mpsc::UnboundedReceiver<PollMsg>) {
    let (msg_tx, msg_rx) = mpsc::unbounded_channel();
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();

    let tx = msg_tx.clone();
    runtime.spawn(async move {
        if tx.send(PollMsg::Quote(quotes.quote(false).await)).is_err() {
            return;
        }

        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            let force = tokio::select! {
                _ = ticker.tick() => false,
                cmd = cmd_rx.recv() => match cmd {
                    Some(PollCmd::Refresh { force }) => force,
                    Some(PollCmd::SaveOrder(ids)) => {
                        if let Err(e) = sync.save_order(&ids).await {
                            tracing::warn!(error = %e, "Failed to save feed order");
                        }
                        continue;
                    }
                    None => return,
                },
            };

            let results = sync.refresh_ordered(&sources, force).await;
            // If the receiver is gone the main thread has exited.
            if tx.send(PollMsg::Feeds(results)).is_err() {
                return;
            }
        }
    });

    let worker = Worker {
        runtime,
        commands: cmd_tx,
        messages: msg_tx,
        orchestrator: Arc::new(orchestrator),
        settings: Arc::new(settings),
    };
    (worker, msg_rx)
}

impl Worker {
    pub fn dispatch(&self, intent: Intent) {
        match intent {
            Intent::Refresh { force } => self.command(PollCmd::Refresh { force }),
            Intent::SaveOrder(ids) => self.command(PollCmd::SaveOrder(ids)),
            Intent::ClearChat(url) => self.clear_chat(url),
            Intent::Summarize {
                generation,
                url,
                title,
            } => self.summarize(generation, url, title),
            Intent::Chat {
                generation,
                question,
                article,
            } => self.chat(generation, question, article),
        }
    }

    fn command(&self, cmd: PollCmd) {
        if self.commands.send(cmd).is_err() {
            tracing::warn!("Poller has stopped; command dropped");
        }
    }

    fn summarize(&self, generation: u64, url: String, title: String) {
        let orchestrator = self.orchestrator.clone();
        let settings = self.settings.clone();
        let tx = self.messages.clone();

        self.runtime.spawn(async move {
            let chunk_tx = tx.clone();
            let mut on_chunk = move |text: &str| {
                // Chunks for a closed pane are ignored by the app.
                let _ = chunk_tx.send(PollMsg::Chunk {
                    generation,
                    text: text.to_string(),
                });
            };
            let result = orchestrator
                .summarize_article(&url, &title, &settings, &mut on_chunk)
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(PollMsg::SummaryDone { generation, result });
        });
    }

    fn clear_chat(&self, url: String) {
        let orchestrator = self.orchestrator.clone();
        self.runtime.spawn(async move {
            if let Err(e) = orchestrator.cache().clear_chat(&url).await {
                tracing::warn!(url = %url, error = %e, "Failed to clear chat transcript");
            }
        });
    }

    fn chat(&self, generation: u64, question: String, article: ArticleContext) {
        let orchestrator = self.orchestrator.clone();
        let settings = self.settings.clone();
        let tx = self.messages.clone();

        self.runtime.spawn(async move {
            let chunk_tx = tx.clone();
            let mut on_chunk = move |text: &str| {
                let _ = chunk_tx.send(PollMsg::Chunk {
                    generation,
                    text: text.to_string(),
                });
            };
            let result = orchestrator
                .chat(&question, &article, &settings, &mut on_chunk)
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(PollMsg::ChatDone { generation, result });
        });
    }
}
