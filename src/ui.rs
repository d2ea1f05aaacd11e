//! Terminal UI rendering.
//!
//! All drawing logic lives here, separated from view state ([`App`]) and
//! input handling ([`crate::input`]).
//!
//! ## For contributors
//!
//! * The layout is a header row, a body, and a one-line status bar.  The
//!   body depends on the authentication status: an explanatory message
//!   while signed out or loading, the notification list plus a detail pane
//!   once signed in.
//! * Colours and styles are defined inline.
//! * [`ratatui`] is the TUI framework; see its docs for widget details.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::App;
use crate::pipeline::PipelineState;
use crate::state::AuthStatus;

const LOGIN_COMMAND: &str = "codeinbox login your-email@example.com";

/// Draw the complete UI for one frame.
pub fn draw(app: &mut App, frame: &mut Frame) {
    let [header_area, body_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    draw_header(app, frame, header_area);
    draw_body(app, frame, body_area);
    draw_status_bar(app, frame, status_area);
}

fn draw_header(app: &App, frame: &mut Frame, area: Rect) {
    let mut spans = vec![Span::styled(
        " CodeInbox ",
        Style::default().add_modifier(Modifier::BOLD),
    )];
    if app.auth.status == AuthStatus::Authenticated {
        spans.push(Span::styled(
            format!("{} notifications", app.notifications().len()),
            Style::default().fg(Color::Green),
        ));
        if let Some(credential) = &app.auth.credential {
            spans.push(Span::raw("  "));
            spans.push(Span::styled(
                format!("Logged in as {}", credential.email),
                Style::default().fg(Color::DarkGray),
            ));
        }
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_body(app: &mut App, frame: &mut Frame, area: Rect) {
    match app.auth.status {
        AuthStatus::Loading => draw_message(
            frame,
            area,
            "Loading...",
            vec!["Checking authentication status".into()],
        ),
        AuthStatus::Error => {
            let reason = app
                .auth
                .error
                .clone()
                .unwrap_or_else(|| "Failed to load authentication".into());
            draw_message(frame, area, "Authentication Error", vec![reason]);
        }
        AuthStatus::Unauthenticated => draw_message(
            frame,
            area,
            "Get Started with CodeInbox",
            vec![
                "Install the CodeInbox CLI tool to receive notifications from AI tools.".into(),
                String::new(),
                "After installation, run:".into(),
                format!("  {LOGIN_COMMAND}"),
            ],
        ),
        AuthStatus::Authenticated => draw_inbox(app, frame, area),
    }
}

fn draw_inbox(app: &mut App, frame: &mut Frame, area: Rect) {
    if app.panel.loading {
        draw_message(
            frame,
            area,
            "Loading notifications...",
            vec!["Fetching your latest updates".into()],
        );
    } else if let Some(error) = app.panel.error.clone() {
        draw_message(
            frame,
            area,
            "Failed to load notifications",
            vec![error, String::new(), "Press r to try again".into()],
        );
    } else if app.notifications().is_empty() {
        draw_message(
            frame,
            area,
            "All caught up!",
            vec!["No new notifications to show".into()],
        );
    } else {
        let [list_area, detail_area] =
            Layout::vertical([Constraint::Percentage(60), Constraint::Percentage(40)]).areas(area);
        draw_notification_list(app, frame, list_area);
        draw_detail(app, frame, detail_area);
    }
}

/// Render the scrollable notification list.
fn draw_notification_list(app: &mut App, frame: &mut Frame, area: Rect) {
    let list_items: Vec<ListItem> = app
        .panel
        .notifications
        .iter()
        .map(|n| {
            let date_str = n
                .sent_at
                .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "no date".into());

            let (marker, title_style) = if n.is_unread() {
                ("● ", Style::default().fg(Color::White).add_modifier(Modifier::BOLD))
            } else {
                ("  ", Style::default().fg(Color::Gray))
            };

            let mut spans = vec![
                Span::styled(marker, Style::default().fg(Color::Blue)),
                Span::styled(
                    format!("{:<18}", date_str),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::raw(" "),
                Span::styled(n.title.as_str(), title_style),
            ];
            if let Some(category) = &n.category {
                spans.push(Span::raw("  "));
                spans.push(Span::styled(
                    format!("[{category}]"),
                    Style::default().fg(Color::Cyan),
                ));
            }

            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(list_items)
        .block(Block::default().title(" Inbox ").borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .add_modifier(Modifier::BOLD)
                .bg(Color::DarkGray),
        )
        .highlight_symbol("▸ ");

    frame.render_stateful_widget(list, area, &mut app.list_state);
}

fn draw_detail(app: &App, frame: &mut Frame, area: Rect) {
    let text = match app.selected() {
        Some(n) => n.content.clone().unwrap_or_default(),
        None => "Select a notification to read it".into(),
    };
    let detail = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .block(Block::default().title(" Details ").borders(Borders::ALL));
    frame.render_widget(detail, area);
}

fn draw_message(frame: &mut Frame, area: Rect, title: &str, body: Vec<String>) {
    let mut lines = vec![
        Line::from(Span::styled(
            title.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::default(),
    ];
    lines.extend(body.into_iter().map(Line::from));

    let message = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(message, area);
}

/// Render the bottom status bar.
fn draw_status_bar(app: &App, frame: &mut Frame, area: Rect) {
    let (label, color) = match app.connection {
        Some(status) if status.push_active => ("live", Color::Green),
        Some(status) if matches!(status.state, PipelineState::Running { .. }) => {
            ("polling", Color::Yellow)
        }
        Some(_) => ("idle", Color::DarkGray),
        None => ("connecting", Color::DarkGray),
    };

    let status = Paragraph::new(Line::from(vec![
        Span::raw(" "),
        Span::styled(label, Style::default().fg(color)),
        Span::raw("  q: quit  ↑/↓: scroll  Home/End: jump  r: refresh"),
    ]));
    frame.render_widget(status, area);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
