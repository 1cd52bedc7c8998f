//! Row types shared by every page
//!
//! A page is a header line plus a list of [`Row`]s. Each row carries a typed
//! [`RowKey`] naming the entity it was built from, so selecting a row never
//! involves parsing its display text.

use crate::models::TaskRef;

/// Job identity carried between pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobKey {
    pub id: String,
    pub namespace: String,
}

/// What a row stands for
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RowKey {
    /// Log lines, spec lines, messages
    #[default]
    None,
    Job(JobKey),
    Task(TaskRef),
    /// Full JSON of one event
    Event(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub key: RowKey,
    pub text: String,
}

impl Row {
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            key: RowKey::None,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn keyed(key: RowKey, text: impl Into<String>) -> Self {
        Self {
            key,
            text: text.into(),
        }
    }

    /// Case-insensitive substring match against the display text
    #[must_use]
    pub fn matches(&self, needle_lower: &str) -> bool {
        needle_lower.is_empty() || self.text.to_lowercase().contains(needle_lower)
    }
}

/// Split a block of text into plain rows, one per line
#[must_use]
pub fn text_rows(text: &str) -> Vec<Row> {
    text.lines().map(Row::plain).collect()
}
