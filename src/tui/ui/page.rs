//! Page rendering
//!
//! Every page is a title line, a column header and a scrolling list of text
//! rows; the exec page uses the same list for terminal output.

use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::tui::app::App;
use crate::tui::page::Page;
use crate::tui::theme::Theme;

use super::widgets::window_start;

pub fn render_page(app: &App, frame: &mut Frame, area: Rect, theme: &Theme) {
    let layout = Layout::vertical([
        Constraint::Length(1), // Title
        Constraint::Length(1), // Column header
        Constraint::Min(0),    // Rows
    ])
    .split(area);

    render_title(app, frame, layout[0], theme);

    let view = app.view();
    let header = Paragraph::new(view.header.as_str())
        .style(Style::default().fg(theme.header_fg).bg(theme.header_bg).bold());
    frame.render_widget(header, layout[1]);

    render_rows(app, frame, layout[2], theme);
}

fn render_title(app: &App, frame: &mut Frame, area: Rect, theme: &Theme) {
    let view = app.view();
    let mut spans = vec![
        Span::styled(format!(" {} ", app.page.title()), Style::default().fg(theme.accent).bold()),
        Span::styled(view.filter_prefix.clone(), Style::default().fg(theme.fg)),
    ];
    if let Some(filter) = view.filter() {
        spans.push(Span::styled(
            format!("  filter: {filter}"),
            Style::default().fg(theme.warn),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_rows(app: &App, frame: &mut Frame, area: Rect, theme: &Theme) {
    let view = app.view();
    let height = area.height as usize;
    let total = view.visible_len();
    let start = window_start(view.list.scroll_offset, view.list.selected, height, total);
    let highlight = view.selection_enabled && app.page != Page::Exec;

    let lines: Vec<Line> = view
        .visible_rows()
        .enumerate()
        .skip(start)
        .take(height)
        .map(|(i, row)| {
            let style = if highlight && i == view.list.selected {
                Style::default().fg(theme.selected_fg).bg(theme.selected_bg)
            } else {
                Style::default().fg(theme.row_color(row))
            };
            Line::styled(row.text.as_str(), style)
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TuiConfig;
    use crate::tui::app::{Command, Row};
    use crate::tui::event::{DataEvent, InputEvent};
    use crate::tui::fetch::PageData;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn draw(app: &App, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal
            .draw(|frame| render_page(app, frame, frame.area(), &Theme::dark()))
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    fn loaded_app(rows: Vec<Row>) -> App {
        let mut app = App::new(TuiConfig::default(), Vec::new());
        app.start();
        let activation = app
            .take_commands()
            .into_iter()
            .find_map(|c| match c {
                Command::Fetch { activation, .. } => Some(activation),
                _ => None,
            })
            .unwrap();
        app.handle_data(DataEvent::PageLoaded {
            activation,
            result: Ok(PageData {
                header: "Name".to_string(),
                rows,
                selection_enabled: true,
                stream: None,
            }),
        });
        app
    }

    #[test]
    fn test_rows_follow_selection() {
        let mut app = loaded_app((0..10).map(|i| Row::plain(format!("row {i}"))).collect());
        app.handle_input(InputEvent::Key(KeyEvent::new(KeyCode::Char('G'), KeyModifiers::NONE)));

        // Three lines of rows below the title and column header
        let text = draw(&app, 40, 5);
        assert!(text.contains("row 9"));
        assert!(text.contains("row 7"));
        assert!(!text.contains("row 0"));
        assert!(text.contains("Jobs in namespace *"));
        assert!(text.contains("Name"));
    }

    #[test]
    fn test_filter_shown_in_title() {
        let mut app = loaded_app(vec![Row::plain("web"), Row::plain("api")]);
        for code in [KeyCode::Char('/'), KeyCode::Char('a'), KeyCode::Enter] {
            app.handle_input(InputEvent::Key(KeyEvent::new(code, KeyModifiers::NONE)));
        }
        let text = draw(&app, 60, 6);
        assert!(text.contains("filter: a"));
        assert!(text.contains("api"));
        assert!(!text.contains("web"));
    }
}
