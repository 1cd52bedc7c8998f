//! State types for the TUI application
//!
//! This module contains state structs and enums:
//! - List navigation (ListState)
//! - Per-page content (PageView)
//! - Navigation context carried between pages
//! - Modal and feedback state

use std::time::{Duration, Instant};

use crate::models::{LogKind, TaskRef};
use crate::tui::page::ContextScope;

use super::types::{JobKey, Row};

/// How long a toast stays on screen
const TOAST_DURATION: Duration = Duration::from_secs(4);

// ============================================================================
// List Navigation State
// ============================================================================

/// List state with selection and scroll tracking
#[derive(Debug, Clone, Default)]
pub struct ListState {
    pub selected: usize,
    pub scroll_offset: usize,
    pub visible_count: usize,
}

impl ListState {
    pub fn clamp(&mut self, list_len: usize) {
        if list_len == 0 {
            self.selected = 0;
            self.scroll_offset = 0;
        } else {
            self.selected = self.selected.min(list_len - 1);
            if self.selected < self.scroll_offset {
                self.scroll_offset = self.selected;
            } else if self.visible_count > 0
                && self.selected >= self.scroll_offset + self.visible_count
            {
                self.scroll_offset = self.selected.saturating_sub(self.visible_count - 1);
            }
        }
    }

    pub fn move_up(&mut self, list_len: usize) {
        if self.selected > 0 {
            self.selected -= 1;
            self.clamp(list_len);
        }
    }

    pub fn move_down(&mut self, list_len: usize) {
        if list_len > 0 && self.selected < list_len - 1 {
            self.selected += 1;
            self.clamp(list_len);
        }
    }

    pub fn move_to_top(&mut self) {
        self.selected = 0;
        self.scroll_offset = 0;
    }

    pub fn move_to_bottom(&mut self, list_len: usize) {
        if list_len > 0 {
            self.selected = list_len - 1;
            if self.visible_count > 0 {
                self.scroll_offset = list_len.saturating_sub(self.visible_count);
            }
        }
    }

    pub fn page_up(&mut self, list_len: usize) {
        let jump = self.visible_count.max(1) / 2;
        self.selected = self.selected.saturating_sub(jump);
        self.clamp(list_len);
    }

    pub fn page_down(&mut self, list_len: usize) {
        let jump = self.visible_count.max(1) / 2;
        self.selected = self.selected.saturating_add(jump);
        self.clamp(list_len);
    }

    /// Selection sits on the last row (or the list is empty)
    #[must_use]
    pub fn at_bottom(&self, list_len: usize) -> bool {
        list_len == 0 || self.selected + 1 >= list_len
    }
}

// ============================================================================
// Page Content
// ============================================================================

/// Content and viewport state of one page
///
/// Views outlive page switches so the cursor is where the user left it when
/// they come back; the rows themselves are replaced by the next load.
#[derive(Debug, Clone)]
pub struct PageView {
    pub header: String,
    rows: Vec<Row>,
    /// Indices into `rows` that pass the applied filter
    visible: Vec<usize>,
    pub list: ListState,
    pub loading: bool,
    /// Scope description shown above the rows
    pub filter_prefix: String,
    filter: Option<String>,
    pub selection_enabled: bool,
}

impl Default for PageView {
    fn default() -> Self {
        Self {
            header: String::new(),
            rows: Vec::new(),
            visible: Vec::new(),
            list: ListState::default(),
            loading: false,
            filter_prefix: String::new(),
            filter: None,
            selection_enabled: true,
        }
    }
}

impl PageView {
    /// Replace all rows, keeping the cursor where it was if possible
    pub fn set_rows(&mut self, header: String, rows: Vec<Row>, selection_enabled: bool) {
        self.header = header;
        self.rows = rows;
        self.selection_enabled = selection_enabled;
        self.loading = false;
        self.refilter();
    }

    pub fn clear(&mut self) {
        self.header.clear();
        self.rows.clear();
        self.list = ListState {
            visible_count: self.list.visible_count,
            ..ListState::default()
        };
        self.refilter();
    }

    /// Mutate rows in place (appending streamed content) with sticky-tail scrolling
    ///
    /// If the cursor was on the last visible row before the change it stays on
    /// the last row afterwards; otherwise the user's position is kept.
    pub fn append_with<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Vec<Row>),
    {
        let pinned = self.list.at_bottom(self.visible.len());
        f(&mut self.rows);
        self.refilter();
        if pinned {
            self.list.move_to_bottom(self.visible.len());
        }
    }

    pub fn push_row(&mut self, row: Row) {
        self.append_with(|rows| rows.push(row));
    }

    /// Rows that pass the applied filter
    pub fn visible_rows(&self) -> impl Iterator<Item = &Row> {
        self.visible.iter().filter_map(|&i| self.rows.get(i))
    }

    #[must_use]
    pub fn visible_len(&self) -> usize {
        self.visible.len()
    }

    #[must_use]
    pub fn selected_row(&self) -> Option<&Row> {
        if !self.selection_enabled {
            return None;
        }
        self.visible
            .get(self.list.selected)
            .and_then(|&i| self.rows.get(i))
    }

    #[must_use]
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn set_filter(&mut self, text: &str) {
        self.filter = (!text.is_empty()).then(|| text.to_string());
        self.list.move_to_top();
        self.refilter();
    }

    pub fn clear_filter(&mut self) {
        self.filter = None;
        self.refilter();
    }

    fn refilter(&mut self) {
        let needle = self.filter.as_deref().unwrap_or("").to_lowercase();
        self.visible = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.matches(&needle))
            .map(|(i, _)| i)
            .collect();
        self.list.clamp(self.visible.len());
    }
}

// ============================================================================
// Navigation Context
// ============================================================================

/// Selections carried from one page to the next
#[derive(Debug, Clone, Default)]
pub struct NavigationContext {
    pub job: Option<JobKey>,
    pub task: Option<TaskRef>,
    /// Full JSON of the selected event
    pub event: Option<String>,
    pub log_line: Option<String>,
    pub log_kind: LogKind,
}

impl NavigationContext {
    /// Drop every selection the destination page does not need
    pub fn retain(&mut self, scope: ContextScope) {
        if !scope.job {
            self.job = None;
        }
        if !scope.task {
            self.task = None;
        }
        if !scope.event {
            self.event = None;
        }
        if !scope.log_line {
            self.log_line = None;
        }
    }
}

// ============================================================================
// Modal State
// ============================================================================

/// Modal overlay state - only one modal can be active at a time.
///
/// The filter edit buffer is the draft being typed; the applied filter lives
/// on the page's [`PageView`].
#[derive(Debug, Default)]
pub enum ModalState {
    #[default]
    None,
    Help,
    Filter {
        edit_buffer: String,
    },
}

impl ModalState {
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self, ModalState::None)
    }

    #[must_use]
    pub fn is_editing_filter(&self) -> bool {
        matches!(self, ModalState::Filter { .. })
    }
}

// ============================================================================
// Feedback State
// ============================================================================

/// A transient notification
#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub is_error: bool,
    pub timestamp: Instant,
}

impl Toast {
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.timestamp.elapsed() < TOAST_DURATION
    }
}

/// Toasts and config warnings
#[derive(Debug, Default)]
pub struct FeedbackState {
    toast: Option<Toast>,
    pub config_warnings: Vec<String>,
}

impl FeedbackState {
    pub fn new(config_warnings: Vec<String>) -> Self {
        Self {
            toast: None,
            config_warnings,
        }
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.toast = Some(Toast {
            message: message.into(),
            is_error: true,
            timestamp: Instant::now(),
        });
    }

    pub fn hide(&mut self) {
        self.toast = None;
    }

    /// Drop the toast once its time is up; true if one was removed
    pub fn expire(&mut self) -> bool {
        if self.toast.as_ref().is_some_and(|t| !t.is_visible()) {
            self.toast = None;
            return true;
        }
        false
    }

    #[must_use]
    pub fn current_toast(&self) -> Option<&Toast> {
        self.toast.as_ref().filter(|t| t.is_visible())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(texts: &[&str]) -> Vec<Row> {
        texts.iter().map(|t| Row::plain(*t)).collect()
    }

    #[test]
    fn test_list_state_navigation() {
        let mut state = ListState {
            visible_count: 10,
            ..ListState::default()
        };

        state.move_down(5);
        assert_eq!(state.selected, 1);

        state.move_to_bottom(5);
        assert_eq!(state.selected, 4);
        assert!(state.at_bottom(5));

        state.move_to_top();
        assert_eq!(state.selected, 0);
        assert!(!state.at_bottom(5));
    }

    #[test]
    fn test_sticky_tail_follows_when_pinned() {
        let mut view = PageView::default();
        view.set_rows(String::new(), rows(&["a", "b"]), true);
        view.list.move_to_bottom(2);

        view.push_row(Row::plain("c"));
        assert_eq!(view.list.selected, 2);
    }

    #[test]
    fn test_sticky_tail_keeps_scrolled_position() {
        let mut view = PageView::default();
        view.set_rows(String::new(), rows(&["a", "b", "c"]), true);
        view.list.move_to_top();

        view.push_row(Row::plain("d"));
        assert_eq!(view.list.selected, 0);
        assert_eq!(view.visible_len(), 4);
    }

    #[test]
    fn test_filter_narrows_selection() {
        let mut view = PageView::default();
        view.set_rows(String::new(), rows(&["web", "api", "Web-2"]), true);
        view.set_filter("WEB");
        let shown: Vec<&str> = view.visible_rows().map(|r| r.text.as_str()).collect();
        assert_eq!(shown, vec!["web", "Web-2"]);
        view.list.move_down(view.visible_len());
        assert_eq!(view.selected_row().map(|r| r.text.as_str()), Some("Web-2"));

        view.clear_filter();
        assert_eq!(view.visible_len(), 3);
    }

    #[test]
    fn test_selection_disabled_has_no_selected_row() {
        let mut view = PageView::default();
        view.set_rows("Error".to_string(), rows(&["nothing here"]), false);
        assert!(view.selected_row().is_none());
    }

    #[test]
    fn test_context_retain() {
        let mut ctx = NavigationContext {
            job: Some(JobKey {
                id: "web".to_string(),
                namespace: "default".to_string(),
            }),
            event: Some("{}".to_string()),
            log_line: Some("line".to_string()),
            log_kind: LogKind::Stderr,
            ..NavigationContext::default()
        };
        ctx.retain(ContextScope {
            job: true,
            ..ContextScope::default()
        });
        assert!(ctx.job.is_some());
        assert!(ctx.event.is_none());
        assert!(ctx.log_line.is_none());
        assert_eq!(ctx.log_kind, LogKind::Stderr);
    }

    #[test]
    fn test_feedback_hide() {
        let mut feedback = FeedbackState::default();
        feedback.error("boom");
        assert!(feedback.current_toast().is_some_and(|t| t.is_error));
        feedback.hide();
        assert!(feedback.current_toast().is_none());
    }
}
