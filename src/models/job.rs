//! Job data models for Nomad JSON responses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Entry of the `GET /v1/jobs` listing
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JobStub {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub namespace: String,
    #[serde(rename = "Type")]
    pub job_type: String,
    pub priority: i64,
    pub status: String,
    pub status_description: String,
    /// Nanoseconds since the Unix epoch
    pub submit_time: i64,
    pub job_summary: Option<JobSummary>,
}

/// Per task group allocation counts
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JobSummary {
    pub summary: BTreeMap<String, TaskGroupSummary>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TaskGroupSummary {
    pub queued: u32,
    pub complete: u32,
    pub failed: u32,
    pub running: u32,
    pub starting: u32,
    pub lost: u32,
}

impl JobStub {
    /// Running allocations summed over all task groups
    #[must_use]
    pub fn running_count(&self) -> u32 {
        self.job_summary
            .as_ref()
            .map(|s| s.summary.values().map(|g| g.running).sum())
            .unwrap_or(0)
    }

    /// Submit time as a local timestamp, if set
    #[must_use]
    pub fn submitted_at(&self) -> Option<chrono::DateTime<chrono::Local>> {
        use chrono::TimeZone;
        if self.submit_time <= 0 {
            return None;
        }
        Some(chrono::Local.timestamp_nanos(self.submit_time))
    }
}

/// Extract `Meta` key/value pairs from a full job specification
///
/// Keys are returned sorted; a job without metadata yields an empty list.
#[must_use]
pub fn job_meta(spec: &serde_json::Value) -> Vec<(String, String)> {
    let Some(meta) = spec.get("Meta").and_then(|m| m.as_object()) else {
        return Vec::new();
    };
    let mut pairs: Vec<(String, String)> = meta
        .iter()
        .map(|(k, v)| {
            let value = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect();
    pairs.sort();
    pairs
}
