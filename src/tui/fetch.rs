//! Fetch dispatch: what each page loads and how API data becomes rows
//!
//! [`plan`] maps the current page and navigation context to exactly one load
//! operation. Remote operations run through [`execute`] on a background task;
//! local ones (detail pages) are rendered immediately.

use chrono::Utc;

use crate::formatting::{align_columns, format_bytes, format_duration_human, pretty_json};
use crate::models::{
    AllocResourceUsage, AllocStub, JobStub, LogKind, TaskRef, Topics, TuiConfig, job_meta, task_rows,
};
use crate::nomad::{EventsStream, LogsStream, NomadClient, NomadResult};
use crate::tui::app::{JobKey, NavigationContext, Row, RowKey, text_rows};
use crate::tui::page::Page;
use crate::tui::stream::TextFeed;

/// Header and rows shown when the first page comes back empty
pub const EMPTY_HEADER: &str = "Error";
pub const EMPTY_ROWS: [&str; 2] = [
    "No results. Is the cluster empty or was no nomad token provided?",
    "Press q or ctrl+c to quit.",
];

/// Navigation attempted without what the destination needs
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavError {
    #[error("selected row is not a {0}")]
    WrongRowKind(&'static str),
    #[error("no {0} selected")]
    MissingContext(&'static str),
    #[error("task {0} is not running")]
    TaskNotRunning(String),
}

/// A remote load, with everything it needs captured by value
#[derive(Debug, Clone, PartialEq)]
pub enum FetchRequest {
    Jobs,
    AllTasks,
    JobTasks { job: JobKey },
    JobSpec { job: JobKey },
    JobMeta { job: JobKey },
    AllocSpec { task: TaskRef },
    Stats { task: TaskRef },
    Logs { task: TaskRef, kind: LogKind, offset: u64, tail: bool },
    Events { topics: Topics, namespace: String, fields: Vec<String> },
}

/// How a page gets its content
#[derive(Debug)]
pub enum PageLoad {
    Remote(FetchRequest),
    Local(PageData),
    /// Content comes from user input (the exec command prompt)
    Prompt,
}

/// A stream left open by a load, to be read by the ingestor
#[derive(Debug)]
pub enum PageStream {
    Logs(LogsStream),
    Events(EventsStream),
}

/// Result of a page load
#[derive(Debug)]
pub struct PageData {
    pub header: String,
    pub rows: Vec<Row>,
    pub selection_enabled: bool,
    pub stream: Option<PageStream>,
}

impl PageData {
    fn rows(header: String, rows: Vec<Row>) -> Self {
        Self {
            header,
            rows,
            selection_enabled: true,
            stream: None,
        }
    }

    /// The "empty cluster or missing token" screen
    #[must_use]
    pub fn empty_placeholder() -> Self {
        Self {
            header: EMPTY_HEADER.to_string(),
            rows: EMPTY_ROWS.iter().map(|r| Row::plain(*r)).collect(),
            selection_enabled: false,
            stream: None,
        }
    }

    /// Rows describing a failed load
    #[must_use]
    pub fn error(message: &str) -> Self {
        Self {
            header: EMPTY_HEADER.to_string(),
            rows: vec![
                Row::plain(format!("Request failed: {message}")),
                Row::plain("Press r to retry, q or ctrl+c to quit."),
            ],
            selection_enabled: false,
            stream: None,
        }
    }
}

fn job(ctx: &NavigationContext) -> Result<JobKey, NavError> {
    ctx.job.clone().ok_or(NavError::MissingContext("job"))
}

fn task(ctx: &NavigationContext) -> Result<TaskRef, NavError> {
    ctx.task.clone().ok_or(NavError::MissingContext("task"))
}

/// The single load operation for `page`
pub fn plan(page: Page, ctx: &NavigationContext, config: &TuiConfig) -> Result<PageLoad, NavError> {
    let request = match page {
        Page::Jobs => FetchRequest::Jobs,
        Page::AllTasks => FetchRequest::AllTasks,
        Page::JobTasks => FetchRequest::JobTasks { job: job(ctx)? },
        Page::JobSpec => FetchRequest::JobSpec { job: job(ctx)? },
        Page::JobMeta => FetchRequest::JobMeta { job: job(ctx)? },
        Page::AllocSpec => FetchRequest::AllocSpec { task: task(ctx)? },
        Page::Stats => FetchRequest::Stats { task: task(ctx)? },
        Page::Logs => FetchRequest::Logs {
            task: task(ctx)?,
            kind: ctx.log_kind,
            offset: config.logs.offset,
            tail: config.logs.tail,
        },
        Page::JobEvents => {
            let job = job(ctx)?;
            FetchRequest::Events {
                topics: config.events.topic_filter().for_job(&job.id),
                namespace: job.namespace,
                fields: config.events.fields.clone(),
            }
        }
        Page::AllocEvents => {
            let task = task(ctx)?;
            FetchRequest::Events {
                topics: Topics::for_alloc(&task.alloc_id),
                namespace: task.namespace,
                fields: config.events.fields.clone(),
            }
        }
        Page::AllEvents => FetchRequest::Events {
            topics: config.events.topic_filter(),
            namespace: config.events.namespace.clone(),
            fields: config.events.fields.clone(),
        },
        Page::JobEvent | Page::AllocEvent | Page::AllEvent => {
            let event = ctx.event.as_deref().ok_or(NavError::MissingContext("event"))?;
            return Ok(PageLoad::Local(PageData::rows(
                String::new(),
                text_rows(&pretty_json(event)),
            )));
        }
        Page::Logline => {
            let line = ctx.log_line.as_deref().ok_or(NavError::MissingContext("log line"))?;
            return Ok(PageLoad::Local(PageData::rows(
                String::new(),
                text_rows(&pretty_json(line)),
            )));
        }
        Page::Exec => {
            task(ctx)?;
            return Ok(PageLoad::Prompt);
        }
    };
    Ok(PageLoad::Remote(request))
}

/// Run one remote load
pub async fn execute(client: &NomadClient, request: FetchRequest) -> NomadResult<PageData> {
    match request {
        FetchRequest::Jobs => Ok(jobs_page(&client.jobs().await?)),
        FetchRequest::AllTasks => {
            let allocs = client.allocations().await?;
            Ok(tasks_page(&allocs, true))
        }
        FetchRequest::JobTasks { job } => {
            let allocs = client.job_allocations(&job.id, &job.namespace).await?;
            Ok(tasks_page(&allocs, false))
        }
        FetchRequest::JobSpec { job } => {
            let spec = client.job_spec(&job.id, &job.namespace).await?;
            Ok(spec_page(&spec))
        }
        FetchRequest::JobMeta { job } => {
            let spec = client.job_spec(&job.id, &job.namespace).await?;
            Ok(meta_page(&spec))
        }
        FetchRequest::AllocSpec { task } => {
            let spec = client.alloc_spec(&task.alloc_id, &task.namespace).await?;
            Ok(spec_page(&spec))
        }
        FetchRequest::Stats { task } => {
            let usage = client.alloc_stats(&task.alloc_id, &task.namespace).await?;
            Ok(stats_page(&usage))
        }
        FetchRequest::Logs {
            task,
            kind,
            offset,
            tail: true,
        } => {
            let stream = client
                .open_logs_stream(&task.alloc_id, &task.task_name, kind, offset, &task.namespace)
                .await?;
            Ok(PageData {
                stream: Some(PageStream::Logs(stream)),
                ..PageData::rows(kind.title().to_string(), Vec::new())
            })
        }
        FetchRequest::Logs {
            task,
            kind,
            offset,
            tail: false,
        } => {
            let text = client
                .logs(&task.alloc_id, &task.task_name, kind, offset, &task.namespace)
                .await?;
            Ok(logs_page(kind, &text))
        }
        FetchRequest::Events {
            topics,
            namespace,
            fields,
        } => {
            let stream = client.open_events_stream(&topics, &namespace, &fields).await?;
            Ok(PageData {
                stream: Some(PageStream::Events(stream)),
                ..PageData::rows(fields.join("  "), Vec::new())
            })
        }
    }
}

/// Jobs listing; an empty list becomes the placeholder screen
#[must_use]
pub fn jobs_page(jobs: &[JobStub]) -> PageData {
    if jobs.is_empty() {
        return PageData::empty_placeholder();
    }
    let cells: Vec<Vec<String>> = jobs
        .iter()
        .map(|job| {
            vec![
                job.id.clone(),
                job.job_type.clone(),
                job.priority.to_string(),
                job.status.clone(),
                job.running_count().to_string(),
                job.submitted_at()
                    .map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    let (header, lines) = align_columns(
        &["ID", "Type", "Priority", "Status", "Running", "Submitted"],
        &cells,
    );
    let rows = jobs
        .iter()
        .zip(lines)
        .map(|(job, line)| {
            Row::keyed(
                RowKey::Job(JobKey {
                    id: job.id.clone(),
                    namespace: job.namespace.clone(),
                }),
                line,
            )
        })
        .collect();
    PageData::rows(header, rows)
}

/// One row per (allocation, task); the all-tasks listing doubles as a first page
#[must_use]
pub fn tasks_page(allocs: &[AllocStub], is_first_page: bool) -> PageData {
    let tasks = task_rows(allocs);
    if tasks.is_empty() && is_first_page {
        return PageData::empty_placeholder();
    }
    let now = Utc::now();
    let ago = |t: Option<chrono::DateTime<Utc>>| {
        t.map(|t| {
            let secs = (now - t).num_seconds().max(0) as u64;
            format!("{} ago", format_duration_human(secs))
        })
        .unwrap_or_else(|| "-".to_string())
    };

    let cells: Vec<Vec<String>> = tasks
        .iter()
        .map(|row| {
            vec![
                row.alloc.job_id.clone(),
                crate::models::short_id(&row.alloc.id).to_string(),
                row.alloc.name.clone(),
                row.task_name.to_string(),
                row.state.state.clone(),
                ago(row.state.started()),
                ago(row.state.finished()),
            ]
        })
        .collect();
    let (header, lines) = align_columns(
        &["Job", "Alloc ID", "Alloc Name", "Task", "State", "Started", "Finished"],
        &cells,
    );
    let rows = tasks
        .iter()
        .zip(lines)
        .map(|(row, line)| Row::keyed(RowKey::Task(row.task_ref()), line))
        .collect();
    PageData::rows(header, rows)
}

#[must_use]
pub fn spec_page(spec: &serde_json::Value) -> PageData {
    let text = serde_json::to_string_pretty(spec).unwrap_or_else(|_| spec.to_string());
    PageData::rows(String::new(), text_rows(&text))
}

#[must_use]
pub fn meta_page(spec: &serde_json::Value) -> PageData {
    let meta = job_meta(spec);
    if meta.is_empty() {
        return PageData {
            selection_enabled: false,
            ..PageData::rows(String::new(), vec![Row::plain("No meta for this job")])
        };
    }
    let cells: Vec<Vec<String>> = meta.into_iter().map(|(k, v)| vec![k, v]).collect();
    let (header, lines) = align_columns(&["Key", "Value"], &cells);
    PageData::rows(header, lines.into_iter().map(Row::plain).collect())
}

#[must_use]
pub fn stats_page(usage: &AllocResourceUsage) -> PageData {
    let cells: Vec<Vec<String>> = usage
        .entries()
        .into_iter()
        .map(|(name, usage)| {
            vec![
                name.to_string(),
                format!("{:.2}%", usage.cpu_stats.percent),
                format_bytes(usage.memory_stats.rss),
                format_bytes(usage.memory_stats.usage),
            ]
        })
        .collect();
    let (header, lines) = align_columns(&["Name", "CPU", "Memory (RSS)", "Memory (Usage)"], &cells);
    PageData::rows(header, lines.into_iter().map(Row::plain).collect())
}

/// A fetched (not followed) log body; blank lines are dropped
#[must_use]
pub fn logs_page(kind: LogKind, text: &str) -> PageData {
    let mut rows = Vec::new();
    TextFeed::new().push_str(&mut rows, text);
    rows.retain(|row| !row.text.trim().is_empty());
    PageData::rows(kind.title().to_string(), rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskState;

    fn ctx_with_task() -> NavigationContext {
        NavigationContext {
            task: Some(TaskRef {
                alloc_id: "1a2b3c4d-0000".to_string(),
                alloc_name: "web.web[0]".to_string(),
                namespace: "default".to_string(),
                job_id: "web".to_string(),
                task_name: "server".to_string(),
                running: true,
            }),
            ..NavigationContext::default()
        }
    }

    fn alloc(id: &str, job: &str, task: &str, state: &str) -> AllocStub {
        let mut states = std::collections::BTreeMap::new();
        states.insert(
            task.to_string(),
            TaskState {
                state: state.to_string(),
                ..TaskState::default()
            },
        );
        AllocStub {
            id: id.to_string(),
            name: format!("{job}.group[0]"),
            namespace: "default".to_string(),
            job_id: job.to_string(),
            task_states: Some(states),
            ..AllocStub::default()
        }
    }

    #[test]
    fn test_empty_jobs_is_placeholder() {
        let data = jobs_page(&[]);
        assert_eq!(data.header, "Error");
        assert_eq!(data.rows.len(), 2);
        assert_eq!(data.rows[0].text, EMPTY_ROWS[0]);
        assert!(!data.selection_enabled);
    }

    #[test]
    fn test_error_page_differs_from_placeholder() {
        let data = PageData::error("could not decode response");
        assert!(!data.selection_enabled);
        assert_ne!(data.rows[0].text, EMPTY_ROWS[0]);
        assert!(data.rows[0].text.contains("could not decode"));
    }

    #[test]
    fn test_jobs_rows_carry_job_key() {
        let jobs = vec![JobStub {
            id: "web".to_string(),
            namespace: "prod".to_string(),
            job_type: "service".to_string(),
            status: "running".to_string(),
            ..JobStub::default()
        }];
        let data = jobs_page(&jobs);
        assert!(data.header.starts_with("ID"));
        assert_eq!(
            data.rows[0].key,
            RowKey::Job(JobKey {
                id: "web".to_string(),
                namespace: "prod".to_string(),
            })
        );
        assert!(data.rows[0].text.starts_with("web"));
    }

    #[test]
    fn test_task_rows_carry_task_ref() {
        let allocs = vec![alloc("bbbbbbbb-2", "web", "server", "running"), alloc("aaaaaaaa-1", "api", "main", "dead")];
        let data = tasks_page(&allocs, false);
        assert_eq!(data.rows.len(), 2);
        let RowKey::Task(first) = &data.rows[0].key else {
            panic!("expected a task row");
        };
        assert_eq!(first.job_id, "api");
        assert!(!first.running);
        assert!(data.rows[1].text.contains("bbbbbbbb"));
    }

    #[test]
    fn test_empty_job_tasks_is_not_placeholder() {
        assert_eq!(tasks_page(&[], false).header, "Job  Alloc ID  Alloc Name  Task  State  Started  Finished");
        assert_eq!(tasks_page(&[], true).header, EMPTY_HEADER);
    }

    #[test]
    fn test_plan_requires_context() {
        let config = TuiConfig::default();
        let ctx = NavigationContext::default();
        assert_eq!(plan(Page::JobTasks, &ctx, &config).unwrap_err(), NavError::MissingContext("job"));
        assert!(matches!(
            plan(Page::Jobs, &ctx, &config),
            Ok(PageLoad::Remote(FetchRequest::Jobs))
        ));
    }

    #[test]
    fn test_plan_alloc_events_uses_alloc_topic() {
        let config = TuiConfig::default();
        let Ok(PageLoad::Remote(FetchRequest::Events { topics, namespace, .. })) =
            plan(Page::AllocEvents, &ctx_with_task(), &config)
        else {
            panic!("expected an events request");
        };
        assert_eq!(topics, Topics::for_alloc("1a2b3c4d-0000"));
        assert_eq!(namespace, "default");
    }

    #[test]
    fn test_plan_exec_prompts() {
        let config = TuiConfig::default();
        assert!(matches!(
            plan(Page::Exec, &ctx_with_task(), &config),
            Ok(PageLoad::Prompt)
        ));
    }

    #[test]
    fn test_plan_logline_renders_locally() {
        let config = TuiConfig::default();
        let ctx = NavigationContext {
            log_line: Some(r#"{"level":"info"}"#.to_string()),
            ..ctx_with_task()
        };
        let Ok(PageLoad::Local(data)) = plan(Page::Logline, &ctx, &config) else {
            panic!("expected local content");
        };
        let texts: Vec<&str> = data.rows.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["{", "  \"level\": \"info\"", "}"]);
    }

    #[test]
    fn test_logs_page_splits_lines() {
        let data = logs_page(LogKind::Stderr, "\x1b[31moops\x1b[0m\n  \t\n\nsecond\n");
        assert_eq!(data.header, "Stderr Logs");
        let texts: Vec<&str> = data.rows.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["oops", "second"]);
    }

    #[test]
    fn test_meta_page() {
        let spec = serde_json::json!({"Meta": {"owner": "ops"}});
        let data = meta_page(&spec);
        assert_eq!(data.header, "Key    Value");
        assert_eq!(data.rows[0].text, "owner  ops");
        assert!(!meta_page(&serde_json::json!({})).selection_enabled);
    }
}
