//! Allocation resource usage (`GET /v1/client/allocation/:id/stats`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AllocResourceUsage {
    pub resource_usage: ResourceUsage,
    pub tasks: BTreeMap<String, TaskResourceUsage>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TaskResourceUsage {
    pub resource_usage: ResourceUsage,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ResourceUsage {
    pub memory_stats: MemoryStats,
    pub cpu_stats: CpuStats,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MemoryStats {
    #[serde(rename = "RSS")]
    pub rss: u64,
    pub cache: u64,
    pub usage: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CpuStats {
    pub percent: f64,
    pub total_ticks: f64,
}

impl AllocResourceUsage {
    /// Rows of (name, usage): the allocation total first, then each task by name
    #[must_use]
    pub fn entries(&self) -> Vec<(&str, &ResourceUsage)> {
        std::iter::once(("Allocation", &self.resource_usage))
            .chain(
                self.tasks
                    .iter()
                    .map(|(name, task)| (name.as_str(), &task.resource_usage)),
            )
            .collect()
    }
}
