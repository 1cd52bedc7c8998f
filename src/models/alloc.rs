//! Allocation and task models.
//!
//! Nomad reports tasks nested inside allocations. The TUI flattens them into
//! one row per (allocation, task) and keeps a [`TaskRef`] next to each row so a
//! selection can be resolved back to the allocation without re-parsing display
//! text.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entry of the allocation listings (`/v1/allocations`, `/v1/job/:id/allocations`)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AllocStub {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub namespace: String,
    #[serde(rename = "NodeID")]
    pub node_id: String,
    pub node_name: String,
    #[serde(rename = "JobID")]
    pub job_id: String,
    pub task_group: String,
    pub client_status: String,
    pub desired_status: String,
    pub task_states: Option<BTreeMap<String, TaskState>>,
}

/// State of a single task inside an allocation
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TaskState {
    pub state: String,
    pub failed: bool,
    pub restarts: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskState {
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }

    /// Start time, treating Go's zero time as unset
    #[must_use]
    pub fn started(&self) -> Option<DateTime<Utc>> {
        self.started_at.filter(|t| t.timestamp() > 0)
    }

    #[must_use]
    pub fn finished(&self) -> Option<DateTime<Utc>> {
        self.finished_at.filter(|t| t.timestamp() > 0)
    }
}

/// Correlation record carried alongside every task row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRef {
    pub alloc_id: String,
    pub alloc_name: String,
    pub namespace: String,
    pub job_id: String,
    pub task_name: String,
    pub running: bool,
}

impl TaskRef {
    /// First eight characters of the allocation ID, as Nomad's CLI shows it
    #[must_use]
    pub fn short_alloc_id(&self) -> &str {
        short_id(&self.alloc_id)
    }
}

/// A flattened (allocation, task) pair
#[derive(Debug, Clone)]
pub struct TaskRow<'a> {
    pub alloc: &'a AllocStub,
    pub task_name: &'a str,
    pub state: &'a TaskState,
}

impl TaskRow<'_> {
    #[must_use]
    pub fn task_ref(&self) -> TaskRef {
        TaskRef {
            alloc_id: self.alloc.id.clone(),
            alloc_name: self.alloc.name.clone(),
            namespace: self.alloc.namespace.clone(),
            job_id: self.alloc.job_id.clone(),
            task_name: self.task_name.to_string(),
            running: self.state.is_running(),
        }
    }
}

/// Flatten allocations into task rows, ordered by job, allocation name, then task
#[must_use]
pub fn task_rows(allocs: &[AllocStub]) -> Vec<TaskRow<'_>> {
    let mut rows: Vec<TaskRow<'_>> = allocs
        .iter()
        .flat_map(|alloc| {
            alloc
                .task_states
                .iter()
                .flatten()
                .map(move |(task_name, state)| TaskRow {
                    alloc,
                    task_name,
                    state,
                })
        })
        .collect();
    rows.sort_by(|a, b| {
        (&a.alloc.job_id, &a.alloc.name, a.task_name, &a.alloc.id).cmp(&(
            &b.alloc.job_id,
            &b.alloc.name,
            b.task_name,
            &b.alloc.id,
        ))
    });
    rows
}

/// Shorten a UUID-style ID to its first eight characters
#[must_use]
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
