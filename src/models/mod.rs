//! Data models for Nomad JSON responses and TUI configuration.

mod alloc;
mod config;
mod event;
mod exec;
mod job;
mod logs;
mod stats;

pub use alloc::{AllocStub, TaskRef, TaskRow, TaskState, short_id, task_rows};
pub use config::{
    DisplayConfig, EventsConfig, LogsConfig, NomadConfig, RefreshConfig, TuiConfig,
};
pub use event::{EventFrame, EventRecord, Topics, decode_event_line};
pub use exec::{ExecInput, ExecOutput, FrameError, OutputStream};
pub use job::{JobStub, JobSummary, TaskGroupSummary, job_meta};
pub use logs::LogKind;
pub use stats::{AllocResourceUsage, ResourceUsage};
