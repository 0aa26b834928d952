//! Keyboard input handling.
//!
//! Maps terminal key events to [`App`] actions. Keys mean different things
//! in three modes: the feed list, the digest pane, and the chat prompt.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};

use crate::app::App;

/// Process a single key event, updating app state accordingly.
///
/// Only reacts to key-press events (ignoring release / repeat) so that each
/// physical keypress triggers exactly one action.
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    if key.kind != KeyEventKind::Press {
        return;
    }

    match &app.pane {
        Some(pane) if pane.input.is_some() => handle_chat_input(app, key.code),
        Some(_) => handle_pane(app, key.code),
        None => handle_list(app, key.code),
    }
}

fn handle_list(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => app.quit = true,
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Up | KeyCode::Char('k') => app.select_previous(),
        KeyCode::Home | KeyCode::Char('g') => app.select_first(),
        KeyCode::End | KeyCode::Char('G') => app.select_last(),
        KeyCode::Char('J') => app.move_section(1),
        KeyCode::Char('K') => app.move_section(-1),
        KeyCode::Enter => app.activate(),
        KeyCode::Char('s') => app.open_summary(),
        KeyCode::Char('m') => app.load_more(),
        KeyCode::Char('r') => app.refresh(),
        _ => {}
    }
}

fn handle_pane(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Esc | KeyCode::Char('q') => app.close_pane(),
        KeyCode::Char('c') => app.start_chat(),
        KeyCode::Down | KeyCode::Char('j') => app.scroll_pane(1),
        KeyCode::Up | KeyCode::Char('k') => app.scroll_pane(-1),
        _ => {}
    }
}

fn handle_chat_input(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Enter => app.submit_chat(),
        KeyCode::Esc => app.cancel_input(),
        KeyCode::Backspace => app.input_backspace(),
        KeyCode::Char(c) => app.input_char(c),
        _ => {}
    }
}
