//! Event stream models.
//!
//! The event stream endpoint emits newline-delimited JSON frames. Each frame is
//! either an empty heartbeat object or a batch of events sharing one index.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Topic filter of an event subscription, e.g. `Job:web` or `Allocation:*`
///
/// Two subscriptions are the same iff their topic sets compare equal, which is
/// how late batches from a replaced stream are recognised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Topics(BTreeMap<String, Vec<String>>);

impl Topics {
    /// Parse a comma separated list of `Topic[:key]` entries
    pub fn parse(spec: &str) -> Result<Self, String> {
        let mut topics: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (topic, key) = match entry.split_once(':') {
                Some((topic, key)) => (topic.trim(), key.trim()),
                None => (entry, "*"),
            };
            if topic.is_empty() || key.is_empty() {
                return Err(format!("malformed topic entry '{entry}'"));
            }
            let keys = topics.entry(topic.to_string()).or_default();
            if !keys.iter().any(|k| k == key) {
                keys.push(key.to_string());
                keys.sort();
            }
        }
        if topics.is_empty() {
            return Err("no topics given".to_string());
        }
        Ok(Self(topics))
    }

    /// Narrow every configured topic to events keyed by one job
    #[must_use]
    pub fn for_job(&self, job_id: &str) -> Self {
        Self(
            self.0
                .keys()
                .map(|topic| (topic.clone(), vec![job_id.to_string()]))
                .collect(),
        )
    }

    /// Allocation events for a single allocation
    #[must_use]
    pub fn for_alloc(alloc_id: &str) -> Self {
        let mut topics = BTreeMap::new();
        topics.insert("Allocation".to_string(), vec![alloc_id.to_string()]);
        Self(topics)
    }

    /// `topic` query parameters for the event stream endpoint
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        self.0
            .iter()
            .flat_map(|(topic, keys)| keys.iter().map(move |key| ("topic", format!("{topic}:{key}"))))
            .collect()
    }
}

impl std::fmt::Display for Topics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .flat_map(|(topic, keys)| keys.iter().map(move |key| format!("{topic}:{key}")))
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

/// One frame of the event stream
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EventFrame {
    pub index: u64,
    pub events: Vec<serde_json::Value>,
}

/// An event ready to be shown: the full payload plus its projected row text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// Compact JSON of the whole event, shown on the detail page
    pub complete: String,
    /// Configured fields only, joined for the listing row
    pub projected: String,
}

impl EventRecord {
    /// Project an event onto the configured fields
    ///
    /// Returns `None` when none of the fields carry a value, so heartbeats and
    /// payload-less events produce no rows.
    #[must_use]
    pub fn project(event: &serde_json::Value, fields: &[String]) -> Option<Self> {
        let values: Vec<String> = fields
            .iter()
            .map(|field| match event.get(field) {
                None | Some(serde_json::Value::Null) => String::new(),
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            })
            .collect();
        if values.iter().all(String::is_empty) {
            return None;
        }
        Some(Self {
            complete: event.to_string(),
            projected: values.join("  "),
        })
    }
}

/// Decode one NDJSON line into displayable records
///
/// Heartbeat frames (`{}`) yield no records. Malformed JSON is an error.
pub fn decode_event_line(line: &str, fields: &[String]) -> Result<Vec<EventRecord>, serde_json::Error> {
    let frame: EventFrame = serde_json::from_str(line)?;
    Ok(frame
        .events
        .iter()
        .filter_map(|event| EventRecord::project(event, fields))
        .collect())
}
