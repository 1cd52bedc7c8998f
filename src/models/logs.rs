//! Task log stream kinds.

use serde::{Deserialize, Serialize};

/// Which of a task's output streams is being viewed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    #[default]
    Stdout,
    Stderr,
}

impl LogKind {
    /// Title shown above the log rows
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            LogKind::Stdout => "Stdout Logs",
            LogKind::Stderr => "Stderr Logs",
        }
    }

    /// Value of the `type` query parameter on the logs endpoint
    #[must_use]
    pub fn as_param(&self) -> &'static str {
        match self {
            LogKind::Stdout => "stdout",
            LogKind::Stderr => "stderr",
        }
    }
}

impl std::fmt::Display for LogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_param())
    }
}
