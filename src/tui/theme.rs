//! Theme definitions for the TUI
//!
//! This module provides colorblind-safe themes for both dark and light terminals.
//! The default is "dark" but users can configure "light" via config file or env var.

use ratatui::style::Color;

use crate::tui::app::{Row, RowKey};

/// Available theme names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeName {
    #[default]
    Dark,
    Light,
}

impl ThemeName {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "light" => ThemeName::Light,
            _ => ThemeName::Dark,
        }
    }
}

/// Color theme for the TUI
#[derive(Debug, Clone)]
pub struct Theme {
    pub name: ThemeName,

    // Base colors
    pub fg: Color,
    pub border: Color,
    pub border_focused: Color,

    // Task status (colorblind-safe)
    pub running: Color,
    pub failed: Color,
    pub dead: Color,

    // UI elements
    pub selected_bg: Color,
    pub selected_fg: Color,
    pub header_bg: Color,
    pub header_fg: Color,
    pub accent: Color,
    pub warn: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

impl Theme {
    /// Create a dark theme (default)
    pub fn dark() -> Self {
        Self {
            name: ThemeName::Dark,

            fg: Color::White,
            border: Color::DarkGray,
            border_focused: Color::Cyan,

            // Colorblind-safe palette for dark backgrounds
            running: Color::Rgb(0, 200, 0),
            failed: Color::Rgb(255, 80, 80),
            dead: Color::DarkGray,

            selected_bg: Color::Rgb(60, 60, 80),
            selected_fg: Color::White,
            header_bg: Color::Rgb(40, 80, 120),
            header_fg: Color::White,
            accent: Color::Cyan,
            warn: Color::Rgb(255, 180, 0),
        }
    }

    /// Create a light theme
    /// Uses darker, more saturated colors for visibility on light backgrounds
    pub fn light() -> Self {
        Self {
            name: ThemeName::Light,

            fg: Color::Black,
            border: Color::Rgb(120, 120, 120),
            border_focused: Color::Rgb(0, 100, 180),

            running: Color::Rgb(0, 140, 0),
            failed: Color::Rgb(200, 0, 0),
            dead: Color::Rgb(100, 100, 100),

            selected_bg: Color::Rgb(200, 220, 255),
            selected_fg: Color::Black,
            header_bg: Color::Rgb(180, 200, 230),
            header_fg: Color::Black,
            accent: Color::Rgb(0, 100, 180),
            warn: Color::Rgb(200, 120, 0),
        }
    }

    /// Create theme from name string
    pub fn from_name(name: &str) -> Self {
        match ThemeName::parse(name) {
            ThemeName::Dark => Self::dark(),
            ThemeName::Light => Self::light(),
        }
    }

    /// Foreground for a listing row
    ///
    /// Task rows are dimmed once the task stops running; other rows use the
    /// plain foreground.
    pub fn row_color(&self, row: &Row) -> Color {
        match &row.key {
            RowKey::Task(task) if task.running => self.running,
            RowKey::Task(_) => self.dead,
            _ => self.fg,
        }
    }

    pub fn toast_color(&self, is_error: bool) -> Color {
        if is_error { self.failed } else { self.running }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskRef;

    #[test]
    fn test_theme_from_name() {
        let dark = Theme::from_name("dark");
        assert_eq!(dark.name, ThemeName::Dark);

        let light = Theme::from_name("Light");
        assert_eq!(light.name, ThemeName::Light);

        // Unknown defaults to dark
        let unknown = Theme::from_name("solarized");
        assert_eq!(unknown.name, ThemeName::Dark);
    }

    #[test]
    fn test_task_rows_dim_when_stopped() {
        let theme = Theme::dark();
        let mut task = TaskRef {
            alloc_id: "a".to_string(),
            alloc_name: "web.web[0]".to_string(),
            namespace: "default".to_string(),
            job_id: "web".to_string(),
            task_name: "server".to_string(),
            running: true,
        };
        assert_eq!(theme.row_color(&Row::keyed(RowKey::Task(task.clone()), "x")), theme.running);
        task.running = false;
        assert_eq!(theme.row_color(&Row::keyed(RowKey::Task(task), "x")), theme.dead);
        assert_eq!(theme.row_color(&Row::plain("x")), theme.fg);
    }
}
