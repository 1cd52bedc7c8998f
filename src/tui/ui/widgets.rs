//! Reusable UI widgets and helper functions
//!
//! This module contains shared rendering utilities used across the page and overlays.

use ratatui::prelude::*;

/// First row to draw so the selection stays inside a viewport of `height` rows
pub fn window_start(offset: usize, selected: usize, height: usize, total: usize) -> usize {
    if height == 0 || total == 0 {
        return 0;
    }
    let offset = offset.min(total.saturating_sub(1));
    if selected < offset {
        selected
    } else if selected >= offset + height {
        selected + 1 - height
    } else {
        offset
    }
}

/// Create a centered rectangle
pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .split(area);

    Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_start() {
        assert_eq!(window_start(0, 0, 5, 20), 0);
        assert_eq!(window_start(0, 9, 5, 20), 5);
        assert_eq!(window_start(8, 3, 5, 20), 3);
        assert_eq!(window_start(4, 6, 5, 20), 4);
        assert_eq!(window_start(3, 0, 0, 20), 0);
    }
}
