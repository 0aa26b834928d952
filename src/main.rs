//! livescroll-digest: a live-updating feed reader with AI article digests.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌──────────┐  PollMsg   ┌──────────┐  draw()  ┌──────────┐
//! │  poll.rs │ ─────────► │  app.rs  │ ───────► │  ui.rs   │
//! │ (tokio)  │ ◄───────── │ (state)  │          │ (render) │
//! └──────────┘   Intent   └──────────┘          └──────────┘
//!                              ▲
//!                              │ handle_key_event()
//!                         ┌──────────┐
//!                         │ input.rs │
//!                         └──────────┘
//! ```
//!
//! * **`livescroll_digest`** (the library): feed sync, archive, summary
//!   and chat streaming.
//! * **`poll`**: background tokio tasks for refreshes and streams.
//! * **`app`**: all UI state (sections, selection, digest pane).
//! * **`ui`**: pure rendering from `App` state.
//! * **`input`**: maps key events to `App` mutations.
//! * **`main`**: loads config, sets up logging and the terminal, and runs
//!   the event loop.

mod app;
mod input;
mod poll;
mod ui;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use livescroll_digest::completion::SummaryCache;
use livescroll_digest::http::{HttpClient, ReqwestClient};
use livescroll_digest::quote::QuoteService;
use livescroll_digest::storage::{JsonFileStore, KvStore};
use livescroll_digest::{
    logging, Clock, CompletionOrchestrator, Config, FeedSynchronizer, SystemClock,
};

use app::App;
use poll::PollMsg;

// ---------------------------------------------------------------------------
// RAII terminal guard
// ---------------------------------------------------------------------------

/// Enters raw mode and the alternate screen; [`Drop`] restores the
/// terminal, including during unwinding.
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl TerminalGuard {
    fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Restore the terminal before the panic message is printed.
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(info);
    }));
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    let _log_guard = logging::init(&config.logging).context("failed to initialize logging")?;
    install_panic_hook();

    // -- shared collaborators ------------------------------------------------
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let store_path = Config::store_path();
    let file_store = runtime
        .block_on(JsonFileStore::open(&store_path))
        .with_context(|| format!("failed to open store at {}", store_path.display()))?;
    tracing::info!(path = %file_store.path().display(), "Store opened");
    let store: Arc<dyn KvStore> = Arc::new(file_store);
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestClient::new()?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let sync =
        FeedSynchronizer::with_config(http.clone(), store.clone(), clock.clone(), &config.cache)
            .with_default_order(config.feed_order.clone());
    let quotes = QuoteService::new(http.clone(), store.clone(), clock.clone());
    let orchestrator = CompletionOrchestrator::with_cache(
        http,
        SummaryCache::with_limit(store, clock, config.cache.summary_limit),
    );

    // -- start background work -----------------------------------------------
    let (worker, mut rx) = poll::spawn(
        runtime.handle().clone(),
        sync,
        quotes,
        orchestrator,
        config.feeds(),
        config.completion.clone(),
    );

    // -- terminal setup (Drop restores on exit or panic) ---------------------
    let mut guard = TerminalGuard::new()?;
    let mut app = App::new(config.cache.page_size);
    tracing::info!(feeds = config.feeds().len(), "Started");

    // -- main event loop -----------------------------------------------------
    // Runs at ~10 fps (100 ms tick). Each iteration:
    //   1. Drain messages from background tasks.
    //   2. Hand queued intents to the worker.
    //   3. Render the UI.
    //   4. Poll for keyboard input (non-blocking, up to tick_rate).
    let tick_rate = Duration::from_millis(100);

    loop {
        while let Ok(msg) = rx.try_recv() {
            match msg {
                PollMsg::Feeds(results) => app.apply_results(results),
                PollMsg::Quote(quote) => app.set_quote(quote),
                PollMsg::Chunk { generation, text } => app.on_chunk(generation, &text),
                PollMsg::SummaryDone { generation, result } => {
                    app.on_summary_done(generation, result)
                }
                PollMsg::ChatDone { generation, result } => app.on_chat_done(generation, result),
            }
        }

        for intent in app.take_intents() {
            worker.dispatch(intent);
        }

        guard.terminal.draw(|f| ui::draw(&mut app, f))?;

        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                input::handle_key_event(&mut app, key);
            }
        }

        if app.quit {
            break;
        }
    }

    // `guard` is dropped here, restoring the terminal.
    Ok(())
}
