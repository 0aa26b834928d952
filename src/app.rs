//! Application state.
//!
//! The feed list is flattened into [`Row`]s: a header per feed section,
//! then an error placeholder if its last refresh failed, then one page of
//! items, then a "load more" row while items remain hidden.
//!
//! Anything that needs the network is queued as an [`Intent`]; the main
//! loop hands intents to the background worker.

use std::mem;

use ratatui::widgets::ListState;

use livescroll_digest::completion::{ArticleContext, ChatMessage, Role, SummaryOutcome};
use livescroll_digest::quote::Quote;
use livescroll_digest::{FeedItem, FeedSource, SourceResult};

/// One feed and whatever of its history has been loaded.
pub struct Section {
    pub feed: FeedSource,
    /// Merged archive, newest first.
    pub items: Vec<FeedItem>,
    /// Why the last refresh failed, if it did.
    pub error: Option<String>,
    /// How many items are currently visible.
    pub shown: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Row {
    Header(usize),
    Error(usize),
    Item(usize, usize),
    More(usize),
}

impl Row {
    pub fn section(self) -> usize {
        match self {
            Row::Header(s) | Row::Error(s) | Row::Item(s, _) | Row::More(s) => s,
        }
    }
}

/// Background work requested by the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Refresh { force: bool },
    SaveOrder(Vec<String>),
    /// Forget the chat transcript of an article whose pane was closed.
    ClearChat(String),
    Summarize {
        generation: u64,
        url: String,
        title: String,
    },
    Chat {
        generation: u64,
        question: String,
        article: ArticleContext,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Streaming {
    Summary,
    Chat,
}

/// The summary and chat view for one article.
pub struct DigestPane {
    /// Only chunks tagged with this generation are shown.
    pub generation: u64,
    pub title: String,
    pub url: String,
    /// Discussion thread, for feeds that link one.
    pub comments_link: Option<String>,
    pub summary: String,
    pub from_cache: bool,
    pub chat: Vec<ChatMessage>,
    pub streaming: Option<Streaming>,
    pub error: Option<String>,
    /// Question being typed, when chat input is open.
    pub input: Option<String>,
    pub scroll: u16,
    article: Option<ArticleContext>,
}

pub struct App {
    pub sections: Vec<Section>,
    page_size: usize,
    /// List selection state for scrolling.
    pub list_state: ListState,
    /// Whether the user has requested to quit.
    pub quit: bool,
    /// Last poll status message.
    pub status: String,
    pub quote: Option<Quote>,
    pub pane: Option<DigestPane>,
    generation: u64,
    intents: Vec<Intent>,
}

impl App {
    pub fn new(page_size: usize) -> Self {
        Self {
            sections: Vec::new(),
            page_size: page_size.max(1),
            list_state: ListState::default(),
            quit: false,
            status: "Starting…".into(),
            quote: None,
            pane: None,
            generation: 0,
            intents: Vec::new(),
        }
    }

    /// Drain queued background work.
    pub fn take_intents(&mut self) -> Vec<Intent> {
        mem::take(&mut self.intents)
    }

    pub fn rows(&self) -> Vec<Row> {
        let mut rows = Vec::new();
        for (s, section) in self.sections.iter().enumerate() {
            rows.push(Row::Header(s));
            if section.error.is_some() {
                rows.push(Row::Error(s));
            }
            let visible = section.shown.min(section.items.len());
            rows.extend((0..visible).map(|i| Row::Item(s, i)));
            if section.items.len() > visible {
                rows.push(Row::More(s));
            }
        }
        rows
    }

    pub fn selected_row(&self) -> Option<Row> {
        let index = self.list_state.selected()?;
        self.rows().get(index).copied()
    }

    pub fn selected_item(&self) -> Option<&FeedItem> {
        match self.selected_row()? {
            Row::Item(s, i) => self.sections.get(s)?.items.get(i),
            _ => None,
        }
    }

    /// Feed items currently loaded, across all sections.
    pub fn item_count(&self) -> usize {
        self.sections.iter().map(|s| s.items.len()).sum()
    }

    // -- feed updates --------------------------------------------------------

    /// Replace the sections with a refresh result, in the order given.
    ///
    /// A failed feed keeps the items it had and gains an error row. The
    /// selected story stays selected if it is still listed.
    pub fn apply_results(&mut self, results: Vec<SourceResult>) {
        let selected_link = self.selected_item().map(|item| item.link.clone());
        let mut previous = mem::take(&mut self.sections);

        let mut failed = 0;
        for result in results {
            let section = match result {
                Ok(fresh) => {
                    let shown = take_section(&mut previous, &fresh.feed.id)
                        .map_or(self.page_size, |s| s.shown);
                    Section {
                        feed: fresh.feed,
                        items: fresh.items,
                        error: None,
                        shown,
                    }
                }
                Err(e) => {
                    failed += 1;
                    let error = Some(e.error.to_string());
                    match take_section(&mut previous, &e.feed.id) {
                        Some(old) => Section {
                            feed: e.feed,
                            error,
                            ..old
                        },
                        None => Section {
                            feed: e.feed,
                            items: Vec::new(),
                            error,
                            shown: self.page_size,
                        },
                    }
                }
            };
            self.sections.push(section);
        }

        self.status = match failed {
            0 => format!("Fetched {} items", self.item_count()),
            n => format!("Fetched {} items, {n} feed(s) failed", self.item_count()),
        };
        self.restore_selection(selected_link.as_deref());
    }

    fn restore_selection(&mut self, link: Option<&str>) {
        let rows = self.rows();
        if rows.is_empty() {
            self.list_state.select(None);
            return;
        }
        let by_link = link.and_then(|link| {
            rows.iter().position(|row| match *row {
                Row::Item(s, i) => self.sections[s].items[i].link == link,
                _ => false,
            })
        });
        let index = by_link
            .or(self.list_state.selected())
            .map(|i| i.min(rows.len() - 1));
        self.list_state.select(index);
    }

    pub fn set_quote(&mut self, quote: Quote) {
        self.quote = Some(quote);
    }

    pub fn refresh(&mut self) {
        self.intents.push(Intent::Refresh { force: true });
        self.status = "Refreshing…".into();
    }

    /// Reveal the next page of the selected section.
    pub fn load_more(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        let page_size = self.page_size;
        if let Some(section) = self.sections.get_mut(row.section()) {
            section.shown = (section.shown + page_size).min(section.items.len().max(page_size));
        }
    }

    /// Enter: more rows on a "load more" row, the summary on a story.
    pub fn activate(&mut self) {
        match self.selected_row() {
            Some(Row::More(_)) => self.load_more(),
            Some(Row::Item(..)) => self.open_summary(),
            _ => {}
        }
    }

    /// Move the selected section up (`-1`) or down (`1`) and save the
    /// new order.
    pub fn move_section(&mut self, delta: isize) {
        let Some(from) = self.selected_row().map(Row::section) else {
            return;
        };
        let Some(to) = from.checked_add_signed(delta).filter(|to| *to < self.sections.len())
        else {
            return;
        };

        self.sections.swap(from, to);
        let ids = self.sections.iter().map(|s| s.feed.id.clone()).collect();
        self.intents.push(Intent::SaveOrder(ids));

        let header = self
            .rows()
            .iter()
            .position(|row| *row == Row::Header(to));
        self.list_state.select(header);
    }

    // -- navigation ----------------------------------------------------------

    pub fn select_next(&mut self) {
        let len = self.rows().len();
        if len == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => (i + 1).min(len - 1),
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn select_previous(&mut self) {
        if self.rows().is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => i.saturating_sub(1),
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn select_first(&mut self) {
        if !self.rows().is_empty() {
            self.list_state.select(Some(0));
        }
    }

    pub fn select_last(&mut self) {
        let len = self.rows().len();
        if len > 0 {
            self.list_state.select(Some(len - 1));
        }
    }

    // -- summary and chat ------------------------------------------------------

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn open_summary(&mut self) {
        let Some(item) = self.selected_item() else {
            return;
        };
        let (title, url) = (item.title.clone(), item.link.clone());
        let comments_link = item.comments_link.clone();
        let generation = self.next_generation();

        self.pane = Some(DigestPane {
            generation,
            title: title.clone(),
            url: url.clone(),
            comments_link,
            summary: String::new(),
            from_cache: false,
            chat: Vec::new(),
            streaming: Some(Streaming::Summary),
            error: None,
            input: None,
            scroll: 0,
            article: None,
        });
        self.intents.push(Intent::Summarize {
            generation,
            url,
            title,
        });
    }

    /// Close the pane and forget its chat transcript. A stream still in
    /// flight keeps running; its chunks are ignored.
    pub fn close_pane(&mut self) {
        if let Some(pane) = self.pane.take() {
            self.intents.push(Intent::ClearChat(pane.url));
        }
    }

    fn pane_for(&mut self, generation: u64) -> Option<&mut DigestPane> {
        self.pane.as_mut().filter(|p| p.generation == generation)
    }

    pub fn on_chunk(&mut self, generation: u64, text: &str) {
        let Some(pane) = self.pane_for(generation) else {
            return;
        };
        match pane.streaming {
            Some(Streaming::Summary) => pane.summary.push_str(text),
            Some(Streaming::Chat) => {
                if let Some(last) = pane.chat.last_mut() {
                    last.content.push_str(text);
                }
            }
            None => {}
        }
    }

    pub fn on_summary_done(&mut self, generation: u64, result: Result<SummaryOutcome, String>) {
        let Some(pane) = self.pane_for(generation) else {
            return;
        };
        pane.streaming = None;
        match result {
            Ok(outcome) => {
                pane.summary = outcome.summary;
                pane.from_cache = outcome.from_cache;
                pane.article = Some(outcome.article);
            }
            Err(message) => pane.error = Some(message),
        }
    }

    pub fn on_chat_done(&mut self, generation: u64, result: Result<String, String>) {
        let Some(pane) = self.pane_for(generation) else {
            return;
        };
        pane.streaming = None;
        match result {
            Ok(answer) => {
                if let Some(last) = pane.chat.last_mut() {
                    last.content = answer;
                }
            }
            Err(message) => {
                if pane.chat.last().is_some_and(|m| m.role == Role::Assistant) {
                    pane.chat.pop();
                }
                pane.error = Some(message);
            }
        }
    }

    /// Open the question prompt, unless a response is still streaming.
    pub fn start_chat(&mut self) {
        if let Some(pane) = self.pane.as_mut().filter(|p| p.streaming.is_none()) {
            pane.input = Some(String::new());
        }
    }

    pub fn input_char(&mut self, c: char) {
        if let Some(input) = self.pane.as_mut().and_then(|p| p.input.as_mut()) {
            input.push(c);
        }
    }

    pub fn input_backspace(&mut self) {
        if let Some(input) = self.pane.as_mut().and_then(|p| p.input.as_mut()) {
            input.pop();
        }
    }

    pub fn cancel_input(&mut self) {
        if let Some(pane) = self.pane.as_mut() {
            pane.input = None;
        }
    }

    pub fn submit_chat(&mut self) {
        let generation = self.generation + 1;
        let Some(pane) = self.pane.as_mut() else {
            return;
        };
        let Some(question) = pane.input.take() else {
            return;
        };
        let question = question.trim().to_string();
        if question.is_empty() {
            return;
        }

        let article = pane.article.clone().unwrap_or_else(|| ArticleContext {
            url: pane.url.clone(),
            title: pane.title.clone(),
            text: None,
            summary: Some(pane.summary.clone()).filter(|s| !s.is_empty()),
        });
        pane.generation = generation;
        pane.error = None;
        pane.streaming = Some(Streaming::Chat);
        pane.chat.push(ChatMessage::user(question.clone()));
        pane.chat.push(ChatMessage::assistant(String::new()));

        self.generation = generation;
        self.intents.push(Intent::Chat {
            generation,
            question,
            article,
        });
    }

    pub fn scroll_pane(&mut self, delta: i16) {
        if let Some(pane) = self.pane.as_mut() {
            pane.scroll = pane.scroll.saturating_add_signed(delta);
        }
    }
}

fn take_section(sections: &mut Vec<Section>, id: &str) -> Option<Section> {
    let index = sections.iter().position(|s| s.feed.id == id)?;
    Some(sections.swap_remove(index))
}
