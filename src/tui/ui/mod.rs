//! UI rendering for the TUI
//!
//! This module handles all rendering using ratatui. The rendering is event-driven -
//! we only render when an event triggers a state change, not at a fixed frame rate.
//!
//! Screen layout, top to bottom: the header block (hidden in compact mode),
//! the page title line, the column header, the rows viewport and the footer.

mod overlays;
mod page;
mod widgets;

use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::tui::app::{App, ModalState};
use crate::tui::exec::{ExecState, PROMPT};
use crate::tui::page::{BrowseMode, Page};
use crate::tui::theme::Theme;

use overlays::{render_filter_overlay, render_help_overlay, render_toast};
use page::render_page;

/// Lines taken by the header block outside compact mode
pub const HEADER_HEIGHT: u16 = 2;
/// Lines taken by the footer
pub const FOOTER_HEIGHT: u16 = 1;
/// Title line plus column header
const PAGE_CHROME: u16 = 2;

/// Height of the rows viewport for a terminal of `total` lines
///
/// The exec pty is sized to this, so the remote terminal fills exactly the
/// rows area.
#[must_use]
pub fn rows_height(total: u16, compact: bool) -> u16 {
    let header = if compact { 0 } else { HEADER_HEIGHT };
    total.saturating_sub(header + PAGE_CHROME + FOOTER_HEIGHT)
}

/// Render the entire TUI
pub fn render(app: &App, frame: &mut Frame) {
    let theme = Theme::from_name(&app.config.display.theme);
    let area = frame.area();

    if let Some(error) = &app.error {
        render_error_screen(error, frame, area, &theme);
        return;
    }

    let header = if app.compact { 0 } else { HEADER_HEIGHT };
    let layout = Layout::vertical([
        Constraint::Length(header),
        Constraint::Min(0),
        Constraint::Length(FOOTER_HEIGHT),
    ])
    .split(area);

    if !app.compact {
        render_header(app, frame, layout[0], &theme);
    }
    render_page(app, frame, layout[1], &theme);
    render_footer(app, frame, layout[2], &theme);

    match &app.modal {
        ModalState::Help => render_help_overlay(frame, area, &theme),
        ModalState::Filter { edit_buffer } => render_filter_overlay(edit_buffer, frame, area, &theme),
        ModalState::None => {}
    }

    if let Some(toast) = app.feedback.current_toast() {
        render_toast(toast, frame, area, &theme);
    }
}

fn render_error_screen(error: &str, frame: &mut Frame, area: Rect, theme: &Theme) {
    let lines = vec![
        Line::styled(format!("Error: {error}"), Style::default().fg(theme.failed)),
        Line::from(""),
        Line::styled("q/ctrl+c to quit", Style::default().fg(theme.border)),
    ];
    frame.render_widget(Paragraph::new(lines), area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect, theme: &Theme) {
    let nomad = &app.config.nomad;
    let mode = match app.mode {
        BrowseMode::Jobs => "jobs",
        BrowseMode::AllTasks => "all tasks",
    };
    let info = Line::from(vec![
        Span::styled(" nomon ", Style::default().fg(theme.header_fg).bg(theme.header_bg).bold()),
        Span::raw(" "),
        Span::styled(nomad.address.clone(), Style::default().fg(theme.accent)),
        Span::styled(
            format!("  namespace {}  browsing {mode}", nomad.namespace),
            Style::default().fg(theme.border),
        ),
    ]);
    let keys = Line::styled(key_help(app), Style::default().fg(theme.border));
    frame.render_widget(Paragraph::new(vec![info, keys]), area);
}

/// Context-sensitive key hints for the header
fn key_help(app: &App) -> &'static str {
    if app.in_pty() {
        return " esc:leave terminal  (all other keys go to the remote shell)";
    }
    match app.page {
        Page::Jobs => {
            " enter:tasks  v:spec  m:meta  E:events  a:all events  t:all tasks  /:filter  ?:help  q:quit"
        }
        Page::AllTasks | Page::JobTasks => {
            " enter:logs  e:exec  s:stats  v:spec  E:events  /:filter  esc:back  ?:help  q:quit"
        }
        Page::Logs => " enter:line  1:stdout  2:stderr  r:reload  /:filter  esc:back  ?:help",
        Page::JobEvents | Page::AllocEvents | Page::AllEvents => {
            " enter:event  /:filter  esc:back  ?:help  q:quit"
        }
        Page::Exec => " enter:run / attach  esc:back  ?:help",
        _ => " /:filter  esc:back  ?:help  q:quit",
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect, theme: &Theme) {
    let mut parts: Vec<Span> = Vec::new();

    match app.exec_state() {
        Some(ExecState::Idle { input }) => {
            parts.push(Span::styled(PROMPT, Style::default().fg(theme.accent)));
            parts.push(Span::raw(input.clone()));
            let x = area.x + (PROMPT.len() + input.chars().count()) as u16;
            frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
        }
        Some(ExecState::Connecting) => {
            parts.push(Span::styled(" connecting...", Style::default().fg(theme.warn)));
        }
        Some(ExecState::Connected(session)) if session.in_pty => {
            parts.push(Span::styled(
                " [terminal] esc to leave",
                Style::default().fg(theme.running).bold(),
            ));
        }
        Some(ExecState::Connected(_)) => {
            parts.push(Span::styled(
                " [detached] enter to attach",
                Style::default().fg(theme.warn),
            ));
        }
        Some(ExecState::Closed) | None => {
            if app.view().loading {
                parts.push(Span::styled(" Loading...", Style::default().fg(theme.warn)));
            }
        }
    }

    // Config warnings stay until fixed
    let warnings = &app.feedback.config_warnings;
    if let Some(first) = warnings.first() {
        let text = if warnings.len() == 1 {
            format!(" | WARN: {first}")
        } else {
            format!(" | WARN: {first} (+{} more)", warnings.len() - 1)
        };
        parts.push(Span::styled(text, Style::default().fg(theme.warn)));
    }

    frame.render_widget(Paragraph::new(Line::from(parts)), area);
}
