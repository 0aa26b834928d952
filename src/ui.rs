//! Terminal UI rendering.
//!
//! All drawing logic lives here, separated from application state ([`App`])
//! and input handling ([`crate::input`]).
//!
//! Layout: a one-line quote header, the feed list (split with the digest
//! pane when one is open), and a one-line status bar.

use chrono::Utc;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

use livescroll_digest::completion::Role;

use crate::app::{App, DigestPane, Row, Streaming};

/// Draw the complete UI for one frame.
pub fn draw(app: &mut App, frame: &mut Frame) {
    let [header_area, main_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    draw_quote(app, frame, header_area);
    if app.pane.is_some() {
        let [list_area, pane_area] =
            Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)])
                .areas(main_area);
        draw_feed_list(app, frame, list_area);
        if let Some(pane) = &app.pane {
            draw_pane(pane, frame, pane_area);
        }
    } else {
        draw_feed_list(app, frame, main_area);
    }
    draw_status_bar(app, frame, status_area);
}

fn draw_quote(app: &App, frame: &mut Frame, area: Rect) {
    let line = match &app.quote {
        Some(quote) => Line::from(vec![
            Span::styled(
                format!(" \"{}\"", quote.text),
                Style::default().add_modifier(Modifier::ITALIC),
            ),
            Span::styled(
                format!("  ~ {}", quote.author),
                Style::default().fg(Color::DarkGray),
            ),
        ]),
        None => Line::from(Span::styled(
            " livescroll-digest",
            Style::default().fg(Color::DarkGray),
        )),
    };
    frame.render_widget(Paragraph::new(line), area);
}

/// Render the scrollable feed list.
fn draw_feed_list(app: &mut App, frame: &mut Frame, area: Rect) {
    let now = Utc::now();
    let list_items: Vec<ListItem> = app
        .rows()
        .into_iter()
        .map(|row| {
            let section = &app.sections[row.section()];
            let (r, g, b) = section.feed.rgb();
            let brand = Color::Rgb(r, g, b);

            let line = match row {
                Row::Header(_) => Line::from(vec![
                    Span::styled("■ ", Style::default().fg(brand)),
                    Span::styled(
                        section.feed.name.clone(),
                        Style::default().fg(brand).add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        format!("  {} stories", section.items.len()),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]),
                Row::Error(_) => Line::from(Span::styled(
                    format!(
                        "  ⚠ couldn't refresh: {}",
                        section.error.as_deref().unwrap_or_default()
                    ),
                    Style::default().fg(Color::Red),
                )),
                Row::Item(_, i) => {
                    let item = &section.items[i];
                    let mut spans = vec![
                        Span::styled(
                            format!("  {:>6} ", item.display_age(now)),
                            Style::default().fg(Color::DarkGray),
                        ),
                        Span::styled(item.title.clone(), Style::default().fg(Color::White)),
                    ];
                    spans.extend(item.meta.iter().map(|tag| {
                        Span::styled(
                            format!("  {} {}", tag.icon, tag.value),
                            Style::default().fg(Color::DarkGray),
                        )
                    }));
                    Line::from(spans)
                }
                Row::More(_) => Line::from(Span::styled(
                    format!(
                        "  … {} more",
                        section.items.len().saturating_sub(section.shown)
                    ),
                    Style::default().fg(Color::Cyan),
                )),
            };

            ListItem::new(line)
        })
        .collect();

    let list = List::new(list_items)
        .block(
            Block::default()
                .title(" Feeds ")
                .borders(Borders::ALL),
        )
        .highlight_style(
            Style::default()
                .add_modifier(Modifier::BOLD)
                .bg(Color::DarkGray),
        )
        .highlight_symbol("▸ ");

    frame.render_stateful_widget(list, area, &mut app.list_state);
}

fn draw_pane(pane: &DigestPane, frame: &mut Frame, area: Rect) {
    let mut lines = vec![
        Line::from(Span::styled(
            pane.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            pane.url.clone(),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    if let Some(comments) = &pane.comments_link {
        lines.push(Line::from(vec![
            Span::styled("Comments: ", Style::default().fg(Color::Cyan)),
            Span::styled(comments.clone(), Style::default().fg(Color::DarkGray)),
        ]));
    }
    lines.push(Line::default());

    if pane.summary.is_empty() && pane.streaming == Some(Streaming::Summary) {
        lines.push(Line::from(Span::styled(
            "Summarizing…",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }
    lines.extend(pane.summary.lines().map(|l| Line::raw(l.to_string())));

    for message in &pane.chat {
        lines.push(Line::default());
        let (label, color) = match message.role {
            Role::User => ("You: ", Color::Cyan),
            Role::Assistant => ("AI: ", Color::Green),
        };
        let mut content = message.content.lines();
        lines.push(Line::from(vec![
            Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
            Span::raw(content.next().unwrap_or_default().to_string()),
        ]));
        lines.extend(content.map(|l| Line::raw(l.to_string())));
    }

    if let Some(error) = &pane.error {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            format!("Error: {error}"),
            Style::default().fg(Color::Red),
        )));
    }
    if let Some(input) = &pane.input {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            format!("> {input}█"),
            Style::default().fg(Color::Yellow),
        )));
    }

    let title = if pane.from_cache {
        " Summary (cached) "
    } else {
        " Summary "
    };
    let paragraph = Paragraph::new(lines)
        .block(Block::default().title(title).borders(Borders::ALL))
        .wrap(Wrap { trim: false })
        .scroll((pane.scroll, 0));
    frame.render_widget(paragraph, area);
}

/// Render the bottom status bar.
fn draw_status_bar(app: &App, frame: &mut Frame, area: Rect) {
    let help = match &app.pane {
        Some(pane) if pane.input.is_some() => "Enter: send  Esc: cancel",
        Some(_) => "Esc: close  c: ask  ↑/↓: scroll",
        None => "q: quit  ↑/↓: move  J/K: reorder  Enter/s: summary  m: more  r: refresh",
    };
    let status = Paragraph::new(Line::from(vec![
        Span::styled(" ", Style::default()),
        Span::styled(&app.status, Style::default().fg(Color::Yellow)),
        Span::raw("  "),
        Span::styled(
            format!("{} items", app.item_count()),
            Style::default().fg(Color::Green),
        ),
        Span::raw("  "),
        Span::raw(help),
    ]));
    frame.render_widget(status, area);
}
