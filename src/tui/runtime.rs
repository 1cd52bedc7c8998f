//! Async runtime and task management for the TUI
//!
//! This module implements the dual-channel event-driven architecture:
//! - Input channel (priority): User input events that are never dropped
//! - Data channel: results of the commands the app queues
//!
//! The main loop uses `tokio::select!` with bias toward the input channel
//! to prevent input starvation under heavy stream traffic. Every command the
//! app queues runs on its own task and reports back exactly once; stream reads
//! additionally stop early when their page activation is cancelled.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{Event, EventStream};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::nomad::NomadClient;
use crate::tui::app::{App, Command};
use crate::tui::event::{DataEvent, EventResult, InputEvent};
use crate::tui::fetch;

/// Channel capacities
const INPUT_CHANNEL_CAPACITY: usize = 16;
const DATA_CHANNEL_CAPACITY: usize = 32;

/// Toast expiry tick
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// TUI runtime managing all background tasks
pub struct TuiRuntime {
    cancel_token: CancellationToken,
    task_handles: Vec<JoinHandle<()>>,
}

impl Default for TuiRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl TuiRuntime {
    /// Create a new TUI runtime
    pub fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
            task_handles: Vec::new(),
        }
    }

    /// Get a clone of the cancellation token for spawning tasks
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Add a task handle to track
    pub fn track(&mut self, handle: JoinHandle<()>) {
        self.task_handles.push(handle);
    }

    /// Signal shutdown and wait for tasks to complete
    pub async fn shutdown(self) {
        self.cancel_token.cancel();

        let shutdown = async {
            for handle in self.task_handles {
                let _ = handle.await;
            }
        };

        tokio::select! {
            _ = shutdown => {}
            _ = tokio::time::sleep(Duration::from_secs(2)) => {
                debug!("background tasks did not stop in time");
            }
        }
    }
}

/// Spawn the input event reader task
pub fn spawn_input_task(tx: mpsc::Sender<InputEvent>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = EventStream::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                maybe_event = reader.next() => {
                    match maybe_event {
                        Some(Ok(event)) => {
                            let input_event = match event {
                                Event::Key(key) => Some(InputEvent::Key(key)),
                                Event::Mouse(mouse) => Some(InputEvent::Mouse(mouse)),
                                Event::Resize(w, h) => Some(InputEvent::Resize(w, h)),
                                _ => None,
                            };

                            if let Some(evt) = input_event
                                && tx.send(evt).await.is_err()
                            {
                                break; // Receiver dropped
                            }
                        }
                        Some(Err(e)) => {
                            let is_fatal = matches!(
                                e.kind(),
                                std::io::ErrorKind::BrokenPipe
                                    | std::io::ErrorKind::ConnectionReset
                                    | std::io::ErrorKind::UnexpectedEof
                            );

                            if is_fatal {
                                info!("Terminal disconnected: {:?}", e);
                                break;
                            }
                            warn!("Terminal event read error: {:?}", e);
                        }
                        None => break,
                    }
                }
            }
        }
    })
}

/// Spawn the toast expiry tick
pub fn spawn_tick(tx: mpsc::Sender<DataEvent>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK_INTERVAL);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    // A missed tick is harmless; the next one expires the toast
                    let _ = tx.try_send(DataEvent::Tick);
                }
            }
        }
    })
}

/// Await `work` unless `scope` is cancelled first
async fn unless_cancelled<T>(scope: &CancellationToken, work: impl Future<Output = T>) -> Option<T> {
    tokio::select! {
        _ = scope.cancelled() => None,
        result = work => Some(result),
    }
}

/// Run one queued command on its own task
pub fn spawn_command(
    command: Command,
    client: NomadClient,
    tx: mpsc::Sender<DataEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let event = match command {
            Command::Fetch {
                activation,
                request,
            } => {
                debug!(page = %activation.page, ?request, "fetching");
                let result = fetch::execute(&client, request).await;
                DataEvent::PageLoaded { activation, result }
            }
            Command::ReadLogs {
                activation,
                stream,
                scope,
            } => {
                let Some((stream, chunk)) = unless_cancelled(&scope, stream.read()).await else {
                    return;
                };
                DataEvent::LogChunk {
                    activation,
                    stream,
                    chunk,
                }
            }
            Command::ReadEvents {
                activation,
                stream,
                scope,
            } => {
                let Some((stream, batch)) = unless_cancelled(&scope, stream.read()).await else {
                    return;
                };
                DataEvent::EventBatch {
                    activation,
                    stream,
                    batch,
                }
            }
            Command::RefreshAfter { activation, delay } => {
                tokio::time::sleep(delay).await;
                DataEvent::RefreshDue { activation }
            }
            Command::ExecConnect {
                activation,
                task,
                command,
            } => {
                let result = client
                    .connect_exec(&task.alloc_id, &task.task_name, &task.namespace, &command)
                    .await;
                DataEvent::ExecConnected { activation, result }
            }
            Command::ExecRead {
                activation,
                reader,
                scope,
            } => {
                let Some((reader, frame)) = unless_cancelled(&scope, reader.read()).await else {
                    return;
                };
                DataEvent::ExecFrame {
                    activation,
                    reader,
                    frame,
                }
            }
        };

        if tx.send(event).await.is_err() {
            debug!("event loop gone, dropping command result");
        }
    })
}

/// Run the main TUI event loop
///
/// `dispatch` receives every command the app queues.
pub async fn run_event_loop(
    mut app: App,
    mut input_rx: mpsc::Receiver<InputEvent>,
    mut data_rx: mpsc::Receiver<DataEvent>,
    mut dispatch: impl FnMut(Command),
    mut render_fn: impl FnMut(&App) -> Result<()>,
) -> Result<()> {
    let mut needs_render = true;

    app.start();

    loop {
        for command in app.take_commands() {
            dispatch(command);
        }

        if needs_render {
            render_fn(&app)?;
            needs_render = false;
        }

        if !app.running {
            break;
        }

        tokio::select! {
            // Bias toward input channel to prevent input starvation
            biased;

            Some(input) = input_rx.recv() => {
                match app.handle_input(input) {
                    EventResult::Continue => needs_render = true,
                    EventResult::Unchanged => {}
                    EventResult::Quit => break,
                }
            }

            Some(data) = data_rx.recv() => {
                match app.handle_data(data) {
                    EventResult::Continue => needs_render = true,
                    EventResult::Unchanged => {}
                    EventResult::Quit => break,
                }
            }

            else => break,
        }
    }

    app.shutdown();
    Ok(())
}

/// Create the dual channels for the TUI
pub fn create_channels() -> (
    mpsc::Sender<InputEvent>,
    mpsc::Receiver<InputEvent>,
    mpsc::Sender<DataEvent>,
    mpsc::Receiver<DataEvent>,
) {
    let (input_tx, input_rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
    let (data_tx, data_rx) = mpsc::channel(DATA_CHANNEL_CAPACITY);
    (input_tx, input_rx, data_tx, data_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TuiConfig;
    use crate::tui::fetch::FetchRequest;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    #[tokio::test]
    async fn test_cancelled_scope_stops_work() {
        let scope = CancellationToken::new();
        scope.cancel();
        let result = unless_cancelled(&scope, std::future::pending::<()>()).await;
        assert!(result.is_none());

        let live = CancellationToken::new();
        assert_eq!(unless_cancelled(&live, async { 7 }).await, Some(7));
    }

    #[tokio::test]
    async fn test_event_loop_dispatches_and_quits() {
        let (input_tx, input_rx, _data_tx, data_rx) = create_channels();
        let app = App::new(TuiConfig::default(), Vec::new());
        let mut dispatched = Vec::new();
        let mut renders = 0;

        input_tx
            .send(InputEvent::Key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE)))
            .await
            .unwrap();

        run_event_loop(
            app,
            input_rx,
            data_rx,
            |command| dispatched.push(command),
            |_| {
                renders += 1;
                Ok(())
            },
        )
        .await
        .unwrap();

        assert_eq!(renders, 1);
        assert!(matches!(
            dispatched.as_slice(),
            [Command::Fetch {
                request: FetchRequest::Jobs,
                ..
            }]
        ));
    }
}
