//! Overlay and popup rendering
//!
//! Handles rendering of the help popup, the filter input and toast notifications.

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::formatting::truncate_string;
use crate::tui::app::Toast;
use crate::tui::theme::Theme;

use super::widgets::centered_rect;

/// Longest toast message before it is cut with "..."
const TOAST_MAX_CHARS: usize = 56;

const HELP_SECTIONS: &[(&str, &[&str])] = &[
    (
        "Navigation",
        &[
            "  j / Down       Move selection down",
            "  k / Up         Move selection up",
            "  g / Home       Jump to top",
            "  G / End        Jump to bottom",
            "  Ctrl+d / PgDn  Half page down",
            "  Ctrl+u / PgUp  Half page up",
            "  Enter          Open the selected row",
            "  Esc            Clear filter, then go back",
        ],
    ),
    (
        "Jobs",
        &[
            "  v              Job spec",
            "  m              Job meta",
            "  E              Job events",
            "  a              All events",
            "  t              Toggle jobs / all tasks",
        ],
    ),
    (
        "Tasks",
        &[
            "  e              Exec into a running task",
            "  s              Allocation stats",
            "  v              Allocation spec",
            "  E              Allocation events",
            "  1 / 2          Stdout / stderr logs",
        ],
    ),
    (
        "General",
        &[
            "  /              Filter rows",
            "  r              Reload the page",
            "  c              Toggle compact mode",
            "  ?/F1           Show this help",
            "  q / Ctrl+c     Quit",
        ],
    ),
];

pub fn render_help_overlay(frame: &mut Frame, area: Rect, theme: &Theme) {
    let popup_area = centered_rect(60, 85, area);

    // Clear the area first
    frame.render_widget(Clear, popup_area);

    let mut help_text = vec![
        Line::from(Span::styled("nomon - Keyboard Shortcuts", Style::default().bold())),
        Line::from(""),
    ];
    for (title, keys) in HELP_SECTIONS {
        help_text.push(Line::from(Span::styled(
            *title,
            Style::default().fg(theme.accent).bold(),
        )));
        help_text.extend(keys.iter().map(|k| Line::from(*k)));
        help_text.push(Line::from(""));
    }
    help_text.push(Line::from(Span::styled(
        "Press any key to close this help",
        Style::default().fg(theme.border),
    )));

    let help_para = Paragraph::new(help_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.border_focused))
                .title(" Help "),
        )
        .style(Style::default().fg(theme.fg));

    frame.render_widget(help_para, popup_area);
}

pub fn render_filter_overlay(edit_buffer: &str, frame: &mut Frame, area: Rect, theme: &Theme) {
    let popup_area = Rect {
        x: area.x + 2,
        y: area.y + 1,
        width: area.width.saturating_sub(4).min(60),
        height: 3.min(area.height),
    };

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.accent))
        .title(" Filter ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let input_text = format!("/{edit_buffer}");
    let cursor = input_text.chars().count() as u16;
    frame.render_widget(
        Paragraph::new(input_text).style(Style::default().fg(theme.fg)),
        inner,
    );
    frame.set_cursor_position((inner.x + cursor.min(inner.width), inner.y));
}

pub fn render_toast(toast: &Toast, frame: &mut Frame, area: Rect, theme: &Theme) {
    let message = truncate_string(&toast.message, TOAST_MAX_CHARS);

    // Position toast at bottom-right
    let toast_width = (message.chars().count() + 4) as u16;
    let toast_area = Rect {
        x: area.width.saturating_sub(toast_width + 2),
        y: area.height.saturating_sub(4),
        width: toast_width.min(area.width),
        height: 3.min(area.height),
    };

    frame.render_widget(Clear, toast_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.toast_color(toast.is_error)));

    let para = Paragraph::new(format!(" {message} "))
        .block(block)
        .style(Style::default().fg(theme.fg))
        .alignment(Alignment::Center);

    frame.render_widget(para, toast_area);
}
