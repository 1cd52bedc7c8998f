//! Application state and core logic for the TUI
//!
//! This module contains the main App struct: the navigation controller that
//! owns all mutable state. It follows a TEA-inspired pattern: input and
//! asynchronous results are applied one at a time through `handle_input` and
//! `handle_data`, and any work they start is queued as [`Command`]s for the
//! runtime to execute.

mod state;
mod types;

pub use state::{FeedbackState, ListState, ModalState, NavigationContext, PageView, Toast};
pub use types::{JobKey, Row, RowKey, text_rows};

use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::models::{ExecOutput, LogKind, TaskRef, Topics, TuiConfig};
use crate::nomad::exec::ExecReader;
use crate::nomad::{EventsStream, ExecSession, LogsStream};
use crate::tui::event::{DataEvent, EventResult, InputEvent, KeyAction};
use crate::tui::exec::{self, CLOSED_ROW, Connected, ExecState};
use crate::tui::fetch::{self, FetchRequest, NavError, PageData, PageLoad, PageStream};
use crate::tui::page::{BrowseMode, Page};
use crate::tui::poll::{Activation, PollScheduler};
use crate::tui::stream::TextFeed;
use crate::tui::ui;

/// Asynchronous work queued by the controller
///
/// Each command produces exactly one [`DataEvent`] tagged with its
/// activation. Reads carry the activation's scope token; cancelling it drops
/// the stream and stops its connection.
#[derive(Debug)]
pub enum Command {
    Fetch {
        activation: Activation,
        request: FetchRequest,
    },
    ReadLogs {
        activation: Activation,
        stream: LogsStream,
        scope: CancellationToken,
    },
    ReadEvents {
        activation: Activation,
        stream: EventsStream,
        scope: CancellationToken,
    },
    RefreshAfter {
        activation: Activation,
        delay: Duration,
    },
    ExecConnect {
        activation: Activation,
        task: TaskRef,
        command: Vec<String>,
    },
    ExecRead {
        activation: Activation,
        reader: ExecReader,
        scope: CancellationToken,
    },
}

/// Stream state of the current page activation
#[derive(Debug, Default)]
pub enum LiveState {
    #[default]
    Idle,
    Logs { feed: TextFeed },
    /// The topic set of the subscription whose batches are accepted
    Events { topics: Topics },
    Exec(ExecState),
}

/// Main application state
pub struct App {
    // Lifecycle
    pub running: bool,
    /// Fatal error; replaces the whole view until quit
    pub error: Option<String>,

    // Navigation
    pub page: Page,
    pub mode: BrowseMode,
    pub ctx: NavigationContext,
    views: [PageView; Page::ALL.len()],
    pub live: LiveState,
    poll: PollScheduler,
    scope: CancellationToken,

    // UI
    pub compact: bool,
    pub modal: ModalState,
    pub feedback: FeedbackState,
    /// Terminal size (columns, rows)
    pub size: (u16, u16),

    pub config: TuiConfig,
    commands: Vec<Command>,
}

impl App {
    pub fn new(config: TuiConfig, config_warnings: Vec<String>) -> Self {
        let mode = if config.display.start_all_tasks {
            BrowseMode::AllTasks
        } else {
            BrowseMode::Jobs
        };
        let page = mode.first_page();

        Self {
            running: true,
            error: None,
            page,
            mode,
            ctx: NavigationContext::default(),
            views: std::array::from_fn(|_| PageView::default()),
            live: LiveState::Idle,
            poll: PollScheduler::new(page, config.refresh.interval()),
            scope: CancellationToken::new(),
            compact: config.display.start_compact,
            modal: ModalState::None,
            feedback: FeedbackState::new(config_warnings),
            size: (80, 24),
            config,
            commands: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_size(mut self, width: u16, height: u16) -> Self {
        self.size = (width, height);
        self
    }

    /// Enter the first page
    pub fn start(&mut self) {
        self.set_page(self.page);
    }

    /// Work queued since the last call
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    /// Apply-if-current guard shared by every asynchronous result
    #[must_use]
    pub fn is_current(&self, activation: Activation) -> bool {
        self.poll.is_current(activation)
    }

    #[must_use]
    pub fn view(&self) -> &PageView {
        &self.views[self.page as usize]
    }

    fn view_mut(&mut self) -> &mut PageView {
        &mut self.views[self.page as usize]
    }

    #[must_use]
    pub fn exec_state(&self) -> Option<&ExecState> {
        match &self.live {
            LiveState::Exec(state) => Some(state),
            _ => None,
        }
    }

    #[must_use]
    pub fn in_pty(&self) -> bool {
        self.exec_state().is_some_and(ExecState::in_pty)
    }

    /// Typing an exec command
    #[must_use]
    pub fn entering_input(&self) -> bool {
        self.exec_state().is_some_and(ExecState::entering_input)
    }

    fn live_stream(&self) -> bool {
        matches!(self.live, LiveState::Logs { .. } | LiveState::Events { .. })
    }

    fn quit(&mut self) -> EventResult {
        self.running = false;
        EventResult::Quit
    }

    /// Close any live stream or exec session
    pub fn shutdown(&mut self) {
        self.scope.cancel();
        self.live = LiveState::Idle;
    }

    // ------------------------------------------------------------------
    // Page switching and loading
    // ------------------------------------------------------------------

    fn set_page(&mut self, page: Page) {
        debug!(from = %self.page, to = %page, "page switch");
        self.feedback.hide();
        self.modal = ModalState::None;
        self.page = page;
        self.ctx.retain(page.spec().scope);

        let prefix = self.filter_prefix(page);
        let height = self.rows_height();
        let view = self.view_mut();
        view.filter_prefix = prefix;
        view.loading = page.spec().does_load;
        view.list.visible_count = height;
        self.load();
    }

    /// Issue the current page's load under a fresh activation
    fn load(&mut self) {
        self.scope.cancel();
        self.scope = CancellationToken::new();
        self.live = LiveState::Idle;
        let activation = self.poll.activate(self.page);

        match fetch::plan(self.page, &self.ctx, &self.config) {
            Ok(PageLoad::Remote(request)) => {
                self.commands.push(Command::Fetch {
                    activation,
                    request,
                });
            }
            Ok(PageLoad::Local(data)) => self.apply_page_data(activation, data),
            Ok(PageLoad::Prompt) => {
                let view = self.view_mut();
                view.clear();
                view.loading = false;
                self.live = LiveState::Exec(ExecState::default());
            }
            Err(err) => {
                warn!(page = %self.page, error = %err, "cannot load page");
                self.view_mut().loading = false;
                self.feedback.error(err.to_string());
            }
        }
    }

    fn apply_page_data(&mut self, activation: Activation, data: PageData) {
        let PageData {
            header,
            rows,
            selection_enabled,
            stream,
        } = data;
        // Logs open on their newest line
        let to_bottom = self.page == Page::Logs;
        let view = self.view_mut();
        view.set_rows(header, rows, selection_enabled);
        if to_bottom {
            let len = view.visible_len();
            view.list.move_to_bottom(len);
        }

        match stream {
            Some(PageStream::Logs(stream)) => {
                self.live = LiveState::Logs {
                    feed: TextFeed::new(),
                };
                self.commands.push(Command::ReadLogs {
                    activation,
                    stream,
                    scope: self.scope.clone(),
                });
            }
            Some(PageStream::Events(stream)) => {
                self.live = LiveState::Events {
                    topics: stream.topics.clone(),
                };
                self.commands.push(Command::ReadEvents {
                    activation,
                    stream,
                    scope: self.scope.clone(),
                });
            }
            None => {}
        }
    }

    fn schedule_refresh(&mut self) {
        if let Some((activation, delay)) = self.poll.next_refresh(self.live_stream()) {
            self.commands.push(Command::RefreshAfter { activation, delay });
        }
    }

    /// Scope description shown above the rows
    fn filter_prefix(&self, page: Page) -> String {
        let job = self.ctx.job.as_ref().map(|j| j.id.as_str()).unwrap_or("");
        let alloc = self
            .ctx
            .task
            .as_ref()
            .map(|t| format!("{} ({})", t.alloc_name, t.short_alloc_id()))
            .unwrap_or_default();
        let task = self
            .ctx
            .task
            .as_ref()
            .map(|t| format!("{} in {alloc}", t.task_name))
            .unwrap_or_default();

        match page {
            Page::Jobs => format!("Jobs in namespace {}", self.config.nomad.namespace),
            Page::AllTasks => format!("All tasks in namespace {}", self.config.nomad.namespace),
            Page::JobTasks => format!("Tasks for job {job}"),
            Page::JobSpec => format!("Spec for job {job}"),
            Page::JobMeta => format!("Meta for job {job}"),
            Page::JobEvents => format!(
                "Events for job {job} ({})",
                self.config.events.topic_filter().for_job(job)
            ),
            Page::JobEvent => format!("Event for job {job}"),
            Page::AllocEvents => format!("Events for allocation {alloc}"),
            Page::AllocEvent => format!("Event for allocation {alloc}"),
            Page::AllEvents => format!(
                "All events in namespace {} ({})",
                self.config.events.namespace,
                self.config.events.topic_filter()
            ),
            Page::AllEvent => "Event".to_string(),
            Page::AllocSpec => format!("Spec for allocation {alloc}"),
            Page::Logs => format!("{} for task {task}", self.ctx.log_kind.title()),
            Page::Logline => format!("Log line for task {task}"),
            Page::Stats => format!("Stats for allocation {alloc}"),
            Page::Exec => format!("Exec into task {task}"),
        }
    }

    fn rows_height(&self) -> usize {
        ui::rows_height(self.size.1, self.compact) as usize
    }

    /// Re-apply the terminal size to every page and the remote pty
    fn sync_viewport(&mut self) {
        let height = self.rows_height();
        for view in &mut self.views {
            let len = view.visible_len();
            view.list.visible_count = height;
            view.list.clamp(len);
        }
        self.resize_pty();
    }

    fn resize_pty(&self) {
        if let LiveState::Exec(ExecState::Connected(session)) = &self.live {
            let height = ui::rows_height(self.size.1, self.compact);
            if let Err(err) = session.writer.resize(height, self.size.0) {
                warn!(error = %err, "could not resize exec tty");
            }
        }
    }

    // ------------------------------------------------------------------
    // Asynchronous results
    // ------------------------------------------------------------------

    /// Apply the result of an asynchronous operation
    pub fn handle_data(&mut self, event: DataEvent) -> EventResult {
        match event {
            DataEvent::Tick => {
                if self.feedback.expire() {
                    EventResult::Continue
                } else {
                    EventResult::Unchanged
                }
            }

            DataEvent::PageLoaded { activation, result } => {
                if !self.is_current(activation) {
                    debug!(page = %activation.page, "dropping stale page load");
                    return EventResult::Unchanged;
                }
                match result {
                    Ok(data) => self.apply_page_data(activation, data),
                    Err(err) => {
                        warn!(page = %self.page, error = %err, "page load failed");
                        self.feedback.error(format!("Could not load {}: {err}", self.page));
                        let data = PageData::error(&err.to_string());
                        self.view_mut()
                            .set_rows(data.header, data.rows, data.selection_enabled);
                    }
                }
                self.schedule_refresh();
                EventResult::Continue
            }

            DataEvent::LogChunk {
                activation,
                stream,
                chunk,
            } => {
                if !self.is_current(activation) {
                    return EventResult::Unchanged;
                }
                let LiveState::Logs { feed } = &mut self.live else {
                    return EventResult::Unchanged;
                };
                match chunk {
                    Some(Ok(text)) => {
                        self.views[self.page as usize].append_with(|rows| {
                            feed.push_str(rows, &text);
                        });
                        self.commands.push(Command::ReadLogs {
                            activation,
                            stream,
                            scope: self.scope.clone(),
                        });
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "log stream failed");
                        self.feedback.error(format!("Log stream failed: {err}"));
                        self.live = LiveState::Idle;
                    }
                    None => {
                        debug!("log stream ended");
                        self.live = LiveState::Idle;
                    }
                }
                EventResult::Continue
            }

            DataEvent::EventBatch {
                activation,
                stream,
                batch,
            } => {
                if !self.is_current(activation) {
                    return EventResult::Unchanged;
                }
                let LiveState::Events { topics } = &self.live else {
                    return EventResult::Unchanged;
                };
                if *topics != stream.topics {
                    debug!(got = %stream.topics, live = %topics, "dropping batch from replaced subscription");
                    return EventResult::Unchanged;
                }
                match batch {
                    Some(Ok(records)) => {
                        let rows = records
                            .into_iter()
                            .map(|r| Row::keyed(RowKey::Event(r.complete), r.projected));
                        self.view_mut().append_with(|all| all.extend(rows));
                        self.commands.push(Command::ReadEvents {
                            activation,
                            stream,
                            scope: self.scope.clone(),
                        });
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "event stream failed");
                        self.feedback.error(format!("Event stream failed: {err}"));
                        self.live = LiveState::Idle;
                    }
                    None => {
                        debug!("event stream ended");
                        self.live = LiveState::Idle;
                    }
                }
                EventResult::Continue
            }

            DataEvent::RefreshDue { activation } => {
                if !self.is_current(activation) {
                    debug!(page = %activation.page, "dropping stale refresh");
                    return EventResult::Unchanged;
                }
                self.load();
                EventResult::Unchanged
            }

            DataEvent::ExecConnected { activation, result } => {
                if !self.is_current(activation) {
                    return EventResult::Unchanged;
                }
                self.view_mut().loading = false;
                match result {
                    Ok(ExecSession { writer, reader }) => {
                        self.live = LiveState::Exec(ExecState::Connected(Connected::new(writer)));
                        self.resize_pty();
                        self.commands.push(Command::ExecRead {
                            activation,
                            reader,
                            scope: self.scope.clone(),
                        });
                    }
                    Err(err) => {
                        warn!(error = %err, "exec connection failed");
                        self.live = LiveState::Exec(ExecState::Closed);
                        self.error = Some(format!("exec session failed: {err}"));
                    }
                }
                EventResult::Continue
            }

            DataEvent::ExecFrame {
                activation,
                reader,
                frame,
            } => {
                if !self.is_current(activation) {
                    return EventResult::Unchanged;
                }
                self.apply_exec_frame(activation, reader, frame)
            }
        }
    }

    fn apply_exec_frame(
        &mut self,
        activation: Activation,
        reader: ExecReader,
        frame: Option<crate::nomad::NomadResult<ExecOutput>>,
    ) -> EventResult {
        let LiveState::Exec(ExecState::Connected(session)) = &mut self.live else {
            return EventResult::Unchanged;
        };
        let view = &mut self.views[self.page as usize];

        let exit_row = match frame {
            Some(Ok(ExecOutput::Data { stream, bytes })) => {
                view.append_with(|rows| session.append_output(rows, stream, &bytes));
                None
            }
            Some(Ok(ExecOutput::Empty)) => None,
            Some(Ok(ExecOutput::Exited { exit_code })) => Some(
                exit_code
                    .map(|code| format!("> exited with code {code}"))
                    .unwrap_or_default(),
            ),
            Some(Err(err)) => {
                warn!(error = %err, "exec stream failed");
                Some(format!("> {err}"))
            }
            None => Some(String::new()),
        };

        match exit_row {
            None => {
                self.commands.push(Command::ExecRead {
                    activation,
                    reader,
                    scope: self.scope.clone(),
                });
            }
            Some(message) => {
                if !message.is_empty() {
                    view.push_row(Row::plain(message));
                }
                view.push_row(Row::plain(CLOSED_ROW));
                let len = view.visible_len();
                view.list.move_to_bottom(len);
                debug!("exec session closed");
                self.live = LiveState::Exec(ExecState::Closed);
            }
        }
        EventResult::Continue
    }

    // ------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------

    /// Handle an input event
    pub fn handle_input(&mut self, event: InputEvent) -> EventResult {
        match event {
            InputEvent::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
            InputEvent::Key(_) => EventResult::Unchanged,
            InputEvent::Resize(width, height) => {
                self.size = (width, height);
                self.sync_viewport();
                EventResult::Continue
            }
            InputEvent::Mouse(mouse) => match KeyAction::from_mouse_event(mouse) {
                KeyAction::MouseScrollUp => self.handle_action(KeyAction::MoveUp),
                KeyAction::MouseScrollDown => self.handle_action(KeyAction::MoveDown),
                _ => EventResult::Unchanged,
            },
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> EventResult {
        if self.error.is_some() {
            return match KeyAction::from_key_event(key, false) {
                KeyAction::Quit => self.quit(),
                _ => EventResult::Unchanged,
            };
        }
        if self.in_pty() {
            return self.handle_pty_key(key);
        }
        if self.modal.is_editing_filter() {
            return self.handle_filter_action(KeyAction::from_key_event(key, true));
        }
        if self.entering_input() {
            return self.handle_prompt_action(KeyAction::from_key_event(key, true));
        }
        if matches!(self.modal, ModalState::Help) {
            self.modal = ModalState::None;
            return EventResult::Continue;
        }
        self.handle_action(KeyAction::from_key_event(key, false))
    }

    /// Keys go to the remote terminal; Esc leaves the pty
    fn handle_pty_key(&mut self, key: KeyEvent) -> EventResult {
        let LiveState::Exec(ExecState::Connected(session)) = &mut self.live else {
            return EventResult::Unchanged;
        };
        if key.code == KeyCode::Esc {
            session.in_pty = false;
            return EventResult::Continue;
        }
        if let Some(bytes) = exec::encode_keypress(key)
            && let Err(err) = session.writer.send_keys(&bytes)
        {
            warn!(error = %err, "could not send keys to exec session");
        }
        EventResult::Unchanged
    }

    fn handle_filter_action(&mut self, action: KeyAction) -> EventResult {
        let ModalState::Filter { edit_buffer } = &mut self.modal else {
            return EventResult::Unchanged;
        };
        match action {
            KeyAction::Quit => return self.quit(),
            KeyAction::Submit => self.modal = ModalState::None,
            KeyAction::Escape => {
                self.modal = ModalState::None;
                self.view_mut().clear_filter();
            }
            KeyAction::InputChar(c) => {
                edit_buffer.push(c);
                let text = edit_buffer.clone();
                self.view_mut().set_filter(&text);
            }
            KeyAction::InputBackspace => {
                edit_buffer.pop();
                let text = edit_buffer.clone();
                self.view_mut().set_filter(&text);
            }
            KeyAction::InputClear => {
                edit_buffer.clear();
                self.view_mut().set_filter("");
            }
            _ => return EventResult::Unchanged,
        }
        EventResult::Continue
    }

    fn handle_prompt_action(&mut self, action: KeyAction) -> EventResult {
        let LiveState::Exec(ExecState::Idle { input }) = &mut self.live else {
            return EventResult::Unchanged;
        };
        match action {
            KeyAction::Quit => return self.quit(),
            KeyAction::Escape => return self.go_back(),
            KeyAction::InputChar(c) => input.push(c),
            KeyAction::InputBackspace => {
                input.pop();
            }
            KeyAction::InputClear => input.clear(),
            KeyAction::Submit => {
                let command = exec::split_command(input);
                if command.is_empty() {
                    return EventResult::Unchanged;
                }
                let Some(task) = self.ctx.task.clone() else {
                    return EventResult::Unchanged;
                };
                debug!(task = %task.task_name, ?command, "connecting exec session");
                let echo = format!("> {}", command.join(" "));
                self.live = LiveState::Exec(ExecState::Connecting);
                let view = self.view_mut();
                view.push_row(Row::plain(echo));
                view.loading = true;
                self.commands.push(Command::ExecConnect {
                    activation: self.poll.current(),
                    task,
                    command,
                });
            }
            _ => return EventResult::Unchanged,
        }
        EventResult::Continue
    }

    fn handle_action(&mut self, action: KeyAction) -> EventResult {
        if let Some(result) = self.handle_navigation(action) {
            return result;
        }

        match action {
            KeyAction::Quit => self.quit(),
            KeyAction::Forward => self.go_forward(),
            KeyAction::Back => self.go_back(),
            KeyAction::Reload => {
                if !self.page.spec().does_reload {
                    return EventResult::Unchanged;
                }
                self.view_mut().loading = true;
                self.load();
                EventResult::Continue
            }
            KeyAction::ToggleCompact => {
                self.compact = !self.compact;
                self.sync_viewport();
                EventResult::Continue
            }
            KeyAction::OpenExec => self.open_task_page(Page::Exec, true),
            KeyAction::OpenStats => self.open_task_page(Page::Stats, true),
            KeyAction::OpenSpec if self.page == Page::Jobs => self.open_job_page(Page::JobSpec),
            KeyAction::OpenSpec => self.open_task_page(Page::AllocSpec, false),
            KeyAction::OpenMeta => self.open_job_page(Page::JobMeta),
            KeyAction::OpenEvents if self.page == Page::Jobs => self.open_job_page(Page::JobEvents),
            KeyAction::OpenEvents => self.open_task_page(Page::AllocEvents, false),
            KeyAction::OpenAllEvents if self.page == Page::Jobs => {
                self.set_page(Page::AllEvents);
                EventResult::Continue
            }
            KeyAction::ToggleMode if self.page.spec().can_be_first => {
                self.mode = match self.mode {
                    BrowseMode::Jobs => BrowseMode::AllTasks,
                    BrowseMode::AllTasks => BrowseMode::Jobs,
                };
                self.set_page(self.mode.first_page());
                EventResult::Continue
            }
            KeyAction::ShowStdout => self.switch_log_kind(LogKind::Stdout),
            KeyAction::ShowStderr => self.switch_log_kind(LogKind::Stderr),
            KeyAction::OpenFilter => {
                let edit_buffer = self.view().filter().unwrap_or("").to_string();
                self.modal = ModalState::Filter { edit_buffer };
                EventResult::Continue
            }
            KeyAction::ShowHelp => {
                self.modal = ModalState::Help;
                EventResult::Continue
            }
            _ => EventResult::Unchanged,
        }
    }

    fn handle_navigation(&mut self, action: KeyAction) -> Option<EventResult> {
        let view = self.view_mut();
        let len = view.visible_len();
        match action {
            KeyAction::MoveUp => view.list.move_up(len),
            KeyAction::MoveDown => view.list.move_down(len),
            KeyAction::MoveToTop => view.list.move_to_top(),
            KeyAction::MoveToBottom => view.list.move_to_bottom(len),
            KeyAction::PageUp => view.list.page_up(len),
            KeyAction::PageDown => view.list.page_down(len),
            _ => return None,
        }
        Some(EventResult::Continue)
    }

    fn go_forward(&mut self) -> EventResult {
        if let LiveState::Exec(ExecState::Connected(session)) = &mut self.live {
            session.in_pty = true;
            return EventResult::Continue;
        }
        let Some(next) = self.page.forward() else {
            return EventResult::Unchanged;
        };
        let Some(row) = self.view().selected_row().cloned() else {
            return EventResult::Unchanged;
        };
        if let Err(err) = self.select_row(row) {
            self.feedback.error(err.to_string());
            return EventResult::Continue;
        }
        self.set_page(next);
        EventResult::Continue
    }

    /// Record the selected row in the navigation context
    fn select_row(&mut self, row: Row) -> Result<(), NavError> {
        match (self.page, row.key) {
            (Page::Jobs, RowKey::Job(job)) => self.ctx.job = Some(job),
            (Page::Jobs, _) => return Err(NavError::WrongRowKind("job")),
            (Page::Logs, _) => self.ctx.log_line = Some(row.text),
            (Page::JobEvents | Page::AllocEvents | Page::AllEvents, RowKey::Event(event)) => {
                self.ctx.event = Some(event);
            }
            (Page::JobEvents | Page::AllocEvents | Page::AllEvents, _) => {
                return Err(NavError::WrongRowKind("event"));
            }
            (page, RowKey::Task(task)) if page.spec().shows_tasks => self.select_task(task),
            (page, _) if page.spec().shows_tasks => return Err(NavError::WrongRowKind("task")),
            _ => {}
        }
        Ok(())
    }

    fn select_task(&mut self, task: TaskRef) {
        self.ctx.job = Some(JobKey {
            id: task.job_id.clone(),
            namespace: task.namespace.clone(),
        });
        self.ctx.task = Some(task);
    }

    fn go_back(&mut self) -> EventResult {
        if self.view().filter().is_some() {
            self.view_mut().clear_filter();
            return EventResult::Continue;
        }
        let back = self.page.backward(self.mode);
        if back == self.page {
            return EventResult::Unchanged;
        }
        self.set_page(back);
        EventResult::Continue
    }

    fn selected_key(&self) -> Option<RowKey> {
        self.view().selected_row().map(|row| row.key.clone())
    }

    /// Shortcut from a job row
    fn open_job_page(&mut self, page: Page) -> EventResult {
        if self.page != Page::Jobs {
            return EventResult::Unchanged;
        }
        match self.selected_key() {
            Some(RowKey::Job(job)) => {
                self.ctx.job = Some(job);
                self.set_page(page);
            }
            Some(_) => self.feedback.error(NavError::WrongRowKind("job").to_string()),
            None => return EventResult::Unchanged,
        }
        EventResult::Continue
    }

    /// Shortcut from a task row
    fn open_task_page(&mut self, page: Page, require_running: bool) -> EventResult {
        if !self.page.spec().shows_tasks {
            return EventResult::Unchanged;
        }
        match self.selected_key() {
            Some(RowKey::Task(task)) if require_running && !task.running => {
                self.feedback
                    .error(NavError::TaskNotRunning(task.task_name).to_string());
            }
            Some(RowKey::Task(task)) => {
                self.select_task(task);
                self.set_page(page);
            }
            Some(_) => self.feedback.error(NavError::WrongRowKind("task").to_string()),
            None => return EventResult::Unchanged,
        }
        EventResult::Continue
    }

    fn switch_log_kind(&mut self, kind: LogKind) -> EventResult {
        if self.page != Page::Logs || self.view().loading || self.ctx.log_kind == kind {
            return EventResult::Unchanged;
        }
        self.ctx.log_kind = kind;
        let prefix = self.filter_prefix(Page::Logs);
        let view = self.view_mut();
        view.filter_prefix = prefix;
        view.loading = true;
        self.load();
        EventResult::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventRecord, ExecInput, JobStub, OutputStream};
    use crate::nomad::NomadError;
    use crate::tui::fetch::{EMPTY_HEADER, EMPTY_ROWS, jobs_page};
    use crossterm::event::KeyModifiers;
    use tokio::sync::mpsc;

    fn app() -> App {
        App::new(TuiConfig::default(), Vec::new())
    }

    fn press(app: &mut App, code: KeyCode) -> EventResult {
        app.handle_input(InputEvent::Key(KeyEvent::new(code, KeyModifiers::NONE)))
    }

    fn press_ctrl(app: &mut App, c: char) -> EventResult {
        app.handle_input(InputEvent::Key(KeyEvent::new(
            KeyCode::Char(c),
            KeyModifiers::CONTROL,
        )))
    }

    fn texts(app: &App) -> Vec<String> {
        app.view().visible_rows().map(|r| r.text.clone()).collect()
    }

    fn last_fetch(app: &mut App) -> (Activation, FetchRequest) {
        app.take_commands()
            .into_iter()
            .rev()
            .find_map(|c| match c {
                Command::Fetch {
                    activation,
                    request,
                } => Some((activation, request)),
                _ => None,
            })
            .expect("a fetch was queued")
    }

    fn job(id: &str) -> JobStub {
        JobStub {
            id: id.to_string(),
            namespace: "default".to_string(),
            status: "running".to_string(),
            ..JobStub::default()
        }
    }

    fn task(running: bool) -> TaskRef {
        TaskRef {
            alloc_id: "1a2b3c4d-5e6f".to_string(),
            alloc_name: "web.web[0]".to_string(),
            namespace: "default".to_string(),
            job_id: "web".to_string(),
            task_name: "server".to_string(),
            running,
        }
    }

    fn task_rows_data(task: TaskRef) -> PageData {
        PageData {
            header: "Task".to_string(),
            rows: vec![Row::keyed(RowKey::Task(task), "server")],
            selection_enabled: true,
            stream: None,
        }
    }

    /// App showing a loaded jobs page
    fn app_on_jobs() -> App {
        let mut app = app();
        app.start();
        let (activation, _) = last_fetch(&mut app);
        app.handle_data(DataEvent::PageLoaded {
            activation,
            result: Ok(jobs_page(&[job("web"), job("api")])),
        });
        app.take_commands();
        app
    }

    /// App showing a loaded job tasks page
    fn app_on_job_tasks(running: bool) -> App {
        let mut app = app_on_jobs();
        press(&mut app, KeyCode::Enter);
        let (activation, _) = last_fetch(&mut app);
        app.handle_data(DataEvent::PageLoaded {
            activation,
            result: Ok(task_rows_data(task(running))),
        });
        app.take_commands();
        app
    }

    #[test]
    fn test_start_fetches_first_page() {
        let mut app = app();
        app.start();
        assert_eq!(app.page, Page::Jobs);
        assert!(app.view().loading);
        let (activation, request) = last_fetch(&mut app);
        assert_eq!(request, FetchRequest::Jobs);
        assert!(app.is_current(activation));
    }

    #[test]
    fn test_start_all_tasks_mode() {
        let mut config = TuiConfig::default();
        config.display.start_all_tasks = true;
        let mut app = App::new(config, Vec::new());
        app.start();
        assert_eq!(app.page, Page::AllTasks);
        assert_eq!(last_fetch(&mut app).1, FetchRequest::AllTasks);
    }

    #[test]
    fn test_forward_then_back_clears_context() {
        let mut app = app_on_jobs();
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.page, Page::JobTasks);
        assert_eq!(app.ctx.job.as_ref().map(|j| j.id.as_str()), Some("web"));
        let (_, request) = last_fetch(&mut app);
        assert!(matches!(request, FetchRequest::JobTasks { job } if job.id == "web"));
        assert_eq!(app.view().filter_prefix, "Tasks for job web");

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.page, Page::Jobs);
        assert!(app.ctx.job.is_none());
        assert!(app.ctx.task.is_none());
    }

    #[test]
    fn test_task_to_logs_and_back() {
        let mut app = app_on_job_tasks(true);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.page, Page::Logs);
        assert_eq!(app.ctx.task, Some(task(true)));
        let (_, request) = last_fetch(&mut app);
        assert!(matches!(request, FetchRequest::Logs { kind: LogKind::Stdout, tail: true, .. }));

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.page, Page::JobTasks);
        assert!(app.ctx.task.is_none());
        assert!(app.ctx.job.is_some());
    }

    #[test]
    fn test_forward_without_rows_is_noop() {
        let mut app = app();
        app.start();
        app.take_commands();
        assert_eq!(press(&mut app, KeyCode::Enter), EventResult::Unchanged);
        assert_eq!(app.page, Page::Jobs);
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let mut app = app_on_jobs();
        press(&mut app, KeyCode::Char('r'));
        let (old, _) = last_fetch(&mut app);
        press(&mut app, KeyCode::Char('r'));
        let (new, _) = last_fetch(&mut app);
        assert_eq!(old.page, new.page);

        let before = texts(&app);
        let result = app.handle_data(DataEvent::PageLoaded {
            activation: old,
            result: Ok(jobs_page(&[job("stale")])),
        });
        assert_eq!(result, EventResult::Unchanged);
        assert_eq!(texts(&app), before);
        assert!(app.take_commands().is_empty());

        app.handle_data(DataEvent::PageLoaded {
            activation: new,
            result: Ok(jobs_page(&[job("fresh")])),
        });
        assert!(texts(&app)[0].starts_with("fresh"));
    }

    #[test]
    fn test_stale_refresh_is_ignored() {
        let mut app = app();
        app.start();
        let (activation, _) = last_fetch(&mut app);
        app.handle_data(DataEvent::PageLoaded {
            activation,
            result: Ok(jobs_page(&[job("web")])),
        });
        let refresh = app
            .take_commands()
            .into_iter()
            .find_map(|c| match c {
                Command::RefreshAfter { activation, delay } => Some((activation, delay)),
                _ => None,
            })
            .expect("refresh scheduled");
        assert_eq!(refresh.1, Duration::from_secs(2));

        press(&mut app, KeyCode::Enter);
        app.take_commands();
        app.handle_data(DataEvent::RefreshDue {
            activation: refresh.0,
        });
        assert!(app.take_commands().is_empty());
        assert_eq!(app.page, Page::JobTasks);
    }

    #[test]
    fn test_current_refresh_reloads() {
        let mut app = app();
        app.start();
        let (activation, _) = last_fetch(&mut app);
        app.handle_data(DataEvent::RefreshDue { activation });
        let (next, request) = last_fetch(&mut app);
        assert_eq!(request, FetchRequest::Jobs);
        assert!(!app.is_current(activation));
        assert!(app.is_current(next));
    }

    #[test]
    fn test_empty_jobs_shows_placeholder() {
        let mut app = app();
        app.start();
        let (activation, _) = last_fetch(&mut app);
        app.handle_data(DataEvent::PageLoaded {
            activation,
            result: Ok(jobs_page(&[])),
        });
        assert_eq!(app.view().header, EMPTY_HEADER);
        assert_eq!(texts(&app), EMPTY_ROWS.map(String::from).to_vec());
        assert!(app.view().selected_row().is_none());
        assert!(app.feedback.current_toast().is_none());
        assert_eq!(press(&mut app, KeyCode::Enter), EventResult::Unchanged);
    }

    #[test]
    fn test_decode_error_is_not_empty_cluster() {
        let mut app = app();
        app.start();
        let (activation, _) = last_fetch(&mut app);
        let err = serde_json::from_str::<Vec<JobStub>>("{").unwrap_err();
        app.handle_data(DataEvent::PageLoaded {
            activation,
            result: Err(NomadError::Decode(err)),
        });
        assert_ne!(texts(&app)[0], EMPTY_ROWS[0]);
        assert!(texts(&app)[0].contains("could not decode"));
        assert!(app.feedback.current_toast().is_some_and(|t| t.is_error));
        assert!(
            app.take_commands()
                .iter()
                .any(|c| matches!(c, Command::RefreshAfter { .. }))
        );
    }

    #[test]
    fn test_filter_then_back() {
        let mut app = app_on_job_tasks(true);
        press(&mut app, KeyCode::Char('/'));
        assert!(app.modal.is_editing_filter());
        press(&mut app, KeyCode::Char('q'));
        assert!(app.running);
        press(&mut app, KeyCode::Backspace);
        press(&mut app, KeyCode::Char('s'));
        press(&mut app, KeyCode::Enter);
        assert!(!app.modal.is_active());
        assert_eq!(app.view().filter(), Some("s"));
        assert_eq!(app.page, Page::JobTasks);

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.page, Page::JobTasks);
        assert_eq!(app.view().filter(), None);

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.page, Page::Jobs);
    }

    #[test]
    fn test_ctrl_c_quits_from_filter() {
        let mut app = app_on_jobs();
        press(&mut app, KeyCode::Char('/'));
        assert_eq!(press_ctrl(&mut app, 'c'), EventResult::Quit);
        assert!(!app.running);
    }

    #[test]
    fn test_exec_requires_running_task() {
        let mut app = app_on_job_tasks(false);
        press(&mut app, KeyCode::Char('e'));
        assert_eq!(app.page, Page::JobTasks);
        assert!(app.feedback.current_toast().is_some());

        press(&mut app, KeyCode::Char('s'));
        assert_eq!(app.page, Page::JobTasks);

        press(&mut app, KeyCode::Char('v'));
        assert_eq!(app.page, Page::AllocSpec);
    }

    #[test]
    fn test_shortcuts_from_jobs() {
        let mut app = app_on_jobs();
        press(&mut app, KeyCode::Char('m'));
        assert_eq!(app.page, Page::JobMeta);
        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Char('a'));
        assert_eq!(app.page, Page::AllEvents);
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.page, Page::Jobs);

        press(&mut app, KeyCode::Char('t'));
        assert_eq!(app.page, Page::AllTasks);
        assert_eq!(app.mode, BrowseMode::AllTasks);
    }

    #[test]
    fn test_page_switch_hides_toast() {
        let mut app = app_on_job_tasks(false);
        press(&mut app, KeyCode::Char('e'));
        assert!(app.feedback.current_toast().is_some());
        press(&mut app, KeyCode::Esc);
        assert!(app.feedback.current_toast().is_none());
    }

    #[tokio::test]
    async fn test_event_batch_for_other_topics_is_dropped() {
        let mut app = app_on_jobs();
        press(&mut app, KeyCode::Char('a'));
        let (activation, request) = last_fetch(&mut app);
        let FetchRequest::Events { topics, fields, .. } = request else {
            panic!("expected an events request");
        };

        let empty = || futures::stream::empty::<Result<Vec<u8>, NomadError>>();
        let live = EventsStream::from_body(empty(), topics.clone(), fields.clone());
        app.handle_data(DataEvent::PageLoaded {
            activation,
            result: Ok(PageData {
                header: fields.join("  "),
                rows: Vec::new(),
                selection_enabled: true,
                stream: Some(PageStream::Events(live)),
            }),
        });
        assert!(
            app.take_commands()
                .iter()
                .any(|c| matches!(c, Command::ReadEvents { .. }))
        );

        let record = EventRecord {
            complete: r#"{"Topic":"Job"}"#.to_string(),
            projected: "Job".to_string(),
        };
        let other = EventsStream::from_body(empty(), Topics::for_alloc("x"), fields.clone());
        let result = app.handle_data(DataEvent::EventBatch {
            activation,
            stream: other,
            batch: Some(Ok(vec![record.clone()])),
        });
        assert_eq!(result, EventResult::Unchanged);
        assert!(texts(&app).is_empty());

        let same = EventsStream::from_body(empty(), topics, fields);
        app.handle_data(DataEvent::EventBatch {
            activation,
            stream: same,
            batch: Some(Ok(vec![record])),
        });
        assert_eq!(texts(&app), vec!["Job".to_string()]);
        assert!(
            app.take_commands()
                .iter()
                .any(|c| matches!(c, Command::ReadEvents { .. }))
        );

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.page, Page::AllEvent);
        assert_eq!(texts(&app), vec!["{", "  \"Topic\": \"Job\"", "}"]);
    }

    #[tokio::test]
    async fn test_log_chunks_are_spliced() {
        let mut app = app_on_job_tasks(true);
        press(&mut app, KeyCode::Enter);
        let (activation, _) = last_fetch(&mut app);

        let empty = || futures::stream::empty::<Result<Vec<u8>, NomadError>>();
        let stream = |sub| LogsStream::from_body(empty(), sub);
        let sub = crate::nomad::stream::LogSubscription {
            alloc_id: "1a2b3c4d-5e6f".to_string(),
            task: "server".to_string(),
            kind: LogKind::Stdout,
        };
        app.handle_data(DataEvent::PageLoaded {
            activation,
            result: Ok(PageData {
                header: LogKind::Stdout.title().to_string(),
                rows: Vec::new(),
                selection_enabled: true,
                stream: Some(PageStream::Logs(stream(sub.clone()))),
            }),
        });
        assert!(
            !app.take_commands()
                .iter()
                .any(|c| matches!(c, Command::RefreshAfter { .. }))
        );

        for chunk in ["first\nsec", "ond\n\x1b[3", "1mthi\x1b[0m", "rd"] {
            app.handle_data(DataEvent::LogChunk {
                activation,
                stream: stream(sub.clone()),
                chunk: Some(Ok(chunk.to_string())),
            });
        }
        assert_eq!(texts(&app), vec!["first", "second", "third"]);
        assert_eq!(app.view().list.selected, 2);

        app.handle_data(DataEvent::LogChunk {
            activation,
            stream: stream(sub),
            chunk: None,
        });
        assert!(matches!(app.live, LiveState::Idle));
    }

    #[tokio::test]
    async fn test_exec_session_flow() {
        let mut app = app_on_job_tasks(true);
        press(&mut app, KeyCode::Char('e'));
        assert_eq!(app.page, Page::Exec);
        assert!(app.entering_input());

        for c in "sh -l".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        assert!(app.running);
        press(&mut app, KeyCode::Enter);
        let (activation, command) = app
            .take_commands()
            .into_iter()
            .find_map(|c| match c {
                Command::ExecConnect {
                    activation,
                    command,
                    ..
                } => Some((activation, command)),
                _ => None,
            })
            .expect("exec connect queued");
        assert_eq!(command, vec!["sh", "-l"]);

        let (input_tx, mut input_rx) = mpsc::unbounded_channel();
        let (output_tx, output_rx) = mpsc::channel(4);
        let session = ExecSession {
            writer: crate::nomad::exec::ExecWriter::new(input_tx, CancellationToken::new()),
            reader: ExecReader::new(output_rx),
        };
        app.handle_data(DataEvent::ExecConnected {
            activation,
            result: Ok(session),
        });
        assert!(app.in_pty());
        assert!(matches!(input_rx.recv().await, Some(ExecInput::TtySize { .. })));

        // q and ctrl+c go to the remote shell
        assert_eq!(press(&mut app, KeyCode::Char('q')), EventResult::Unchanged);
        assert_eq!(press_ctrl(&mut app, 'c'), EventResult::Unchanged);
        assert!(app.running);
        assert_eq!(input_rx.recv().await, Some(ExecInput::Stdin(b"q".to_vec())));
        assert_eq!(input_rx.recv().await, Some(ExecInput::Stdin(vec![0x03])));

        fn frame(bytes: &[u8]) -> Option<crate::nomad::NomadResult<ExecOutput>> {
            Some(Ok(ExecOutput::Data {
                stream: OutputStream::Stdout,
                bytes: bytes.to_vec(),
            }))
        }
        let reader = ExecReader::new(mpsc::channel(1).1);
        app.handle_data(DataEvent::ExecFrame {
            activation,
            reader,
            frame: frame(b"foo"),
        });
        let reader = ExecReader::new(mpsc::channel(1).1);
        app.handle_data(DataEvent::ExecFrame {
            activation,
            reader,
            frame: frame(b"bar\n"),
        });
        assert_eq!(texts(&app), vec!["> sh -l", "foobar"]);

        press(&mut app, KeyCode::Esc);
        assert!(!app.in_pty());
        press(&mut app, KeyCode::Enter);
        assert!(app.in_pty());
        press(&mut app, KeyCode::Esc);

        app.handle_data(DataEvent::ExecFrame {
            activation,
            reader: ExecReader::new(mpsc::channel(1).1),
            frame: None,
        });
        assert_eq!(texts(&app).last().map(String::as_str), Some(CLOSED_ROW));
        assert!(matches!(app.exec_state(), Some(ExecState::Closed)));
        assert_eq!(input_rx.recv().await, Some(ExecInput::CloseStdin));
        drop(output_tx);

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.page, Page::JobTasks);
    }

    #[tokio::test]
    async fn test_leaving_exec_closes_session() {
        let mut app = app_on_job_tasks(true);
        press(&mut app, KeyCode::Char('e'));
        press(&mut app, KeyCode::Char('l'));
        press(&mut app, KeyCode::Char('s'));
        press(&mut app, KeyCode::Enter);
        let activation = app.poll.current();
        app.take_commands();

        let (input_tx, mut input_rx) = mpsc::unbounded_channel();
        let session = ExecSession {
            writer: crate::nomad::exec::ExecWriter::new(input_tx, CancellationToken::new()),
            reader: ExecReader::new(mpsc::channel(1).1),
        };
        app.handle_data(DataEvent::ExecConnected {
            activation,
            result: Ok(session),
        });
        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.page, Page::JobTasks);

        let mut frames = Vec::new();
        while let Ok(frame) = input_rx.try_recv() {
            frames.push(frame);
        }
        assert_eq!(frames.last(), Some(&ExecInput::CloseStdin));
    }

    #[tokio::test]
    async fn test_pty_follows_terminal_size() {
        let mut app = app_on_job_tasks(true);
        press(&mut app, KeyCode::Char('e'));
        press(&mut app, KeyCode::Char('s'));
        press(&mut app, KeyCode::Char('h'));
        press(&mut app, KeyCode::Enter);
        let activation = app.poll.current();
        app.take_commands();

        let (input_tx, mut input_rx) = mpsc::unbounded_channel();
        let session = ExecSession {
            writer: crate::nomad::exec::ExecWriter::new(input_tx, CancellationToken::new()),
            reader: ExecReader::new(mpsc::channel(1).1),
        };
        app.handle_data(DataEvent::ExecConnected {
            activation,
            result: Ok(session),
        });
        assert_eq!(
            input_rx.try_recv().ok(),
            Some(ExecInput::TtySize {
                height: ui::rows_height(24, false),
                width: 80
            })
        );

        app.handle_input(InputEvent::Resize(100, 30));
        assert_eq!(
            input_rx.try_recv().ok(),
            Some(ExecInput::TtySize {
                height: ui::rows_height(30, false),
                width: 100
            })
        );

        // leave the pty so c toggles compact mode instead of reaching the shell
        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Char('c'));
        assert!(app.compact);
        assert_eq!(
            input_rx.try_recv().ok(),
            Some(ExecInput::TtySize {
                height: ui::rows_height(30, true),
                width: 100
            })
        );

        app.handle_data(DataEvent::ExecFrame {
            activation,
            reader: ExecReader::new(mpsc::channel(1).1),
            frame: None,
        });
        assert!(matches!(app.exec_state(), Some(ExecState::Closed)));
        assert_eq!(input_rx.try_recv().ok(), Some(ExecInput::CloseStdin));

        app.handle_input(InputEvent::Resize(120, 40));
        press(&mut app, KeyCode::Char('c'));
        assert!(!app.compact);
        assert!(input_rx.try_recv().is_err());
    }

    #[test]
    fn test_fetched_logs_open_at_bottom() {
        let mut app = app_on_job_tasks(true);
        press(&mut app, KeyCode::Enter);
        let (activation, _) = last_fetch(&mut app);
        app.handle_data(DataEvent::PageLoaded {
            activation,
            result: Ok(fetch::logs_page(LogKind::Stdout, "one\n\ntwo\n   \nthree\n")),
        });
        assert_eq!(texts(&app), vec!["one", "two", "three"]);
        assert_eq!(app.view().list.selected, 2);
    }

    #[test]
    fn test_error_screen_only_quits() {
        let mut app = app_on_jobs();
        app.error = Some("boom".to_string());
        assert_eq!(press(&mut app, KeyCode::Enter), EventResult::Unchanged);
        assert_eq!(app.page, Page::Jobs);
        assert_eq!(press(&mut app, KeyCode::Char('q')), EventResult::Quit);
    }

    #[test]
    fn test_switch_log_kind() {
        let mut app = app_on_job_tasks(true);
        press(&mut app, KeyCode::Enter);
        app.take_commands();
        // still loading
        assert_eq!(press(&mut app, KeyCode::Char('2')), EventResult::Unchanged);

        app.view_mut().loading = false;
        press(&mut app, KeyCode::Char('2'));
        assert_eq!(app.ctx.log_kind, LogKind::Stderr);
        assert!(app.view().filter_prefix.starts_with("Stderr Logs"));
        let (_, request) = last_fetch(&mut app);
        assert!(matches!(request, FetchRequest::Logs { kind: LogKind::Stderr, .. }));
    }
}
