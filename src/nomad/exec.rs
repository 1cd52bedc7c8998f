//! Exec websocket session.
//!
//! A connected session is split in two halves: [`ExecWriter`] sends keystrokes
//! and terminal sizes, [`ExecReader`] yields decoded output frames one read at
//! a time. A heartbeat task keeps the connection alive until the session is
//! closed or the remote end goes away.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{NomadClient, NomadError, NomadResult, TOKEN_HEADER};
use crate::models::{ExecInput, ExecOutput};

/// Interval between keepalive frames
pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(10);

const OUTPUT_CAPACITY: usize = 64;

/// Sending half of a connected session
#[derive(Debug)]
pub struct ExecWriter {
    input: Option<mpsc::UnboundedSender<ExecInput>>,
    heartbeat: CancellationToken,
}

impl ExecWriter {
    pub(crate) fn new(input: mpsc::UnboundedSender<ExecInput>, heartbeat: CancellationToken) -> Self {
        Self {
            input: Some(input),
            heartbeat,
        }
    }

    fn send(&self, frame: ExecInput) -> NomadResult<()> {
        self.input
            .as_ref()
            .ok_or(NomadError::StreamClosed)?
            .send(frame)
            .map_err(|_| NomadError::StreamClosed)
    }

    /// Write raw keystroke bytes to the remote stdin
    pub fn send_keys(&self, bytes: &[u8]) -> NomadResult<()> {
        self.send(ExecInput::Stdin(bytes.to_vec()))
    }

    pub fn resize(&self, height: u16, width: u16) -> NomadResult<()> {
        self.send(ExecInput::TtySize { height, width })
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.input.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Stop the heartbeat and close the remote stdin
    ///
    /// Safe to call more than once; later calls do nothing.
    pub fn close(&mut self) {
        self.heartbeat.cancel();
        if let Some(input) = self.input.take() {
            let _ = input.send(ExecInput::CloseStdin);
            debug!("exec session closed");
        }
    }
}

impl Drop for ExecWriter {
    fn drop(&mut self) {
        self.close();
    }
}

/// Receiving half of a connected session
#[derive(Debug)]
pub struct ExecReader {
    rx: mpsc::Receiver<NomadResult<ExecOutput>>,
}

impl ExecReader {
    pub(crate) fn new(rx: mpsc::Receiver<NomadResult<ExecOutput>>) -> Self {
        Self { rx }
    }

    /// Wait for the next output frame; `None` once the connection is gone
    pub async fn read(mut self) -> (Self, Option<NomadResult<ExecOutput>>) {
        let frame = self.rx.recv().await;
        (self, frame)
    }
}

/// Both halves of a freshly connected session
#[derive(Debug)]
pub struct ExecSession {
    pub writer: ExecWriter,
    pub reader: ExecReader,
}

impl NomadClient {
    /// Open an interactive session running `command` inside a task
    pub async fn connect_exec(
        &self,
        alloc_id: &str,
        task: &str,
        namespace: &str,
        command: &[String],
    ) -> NomadResult<ExecSession> {
        let url = self.exec_url(alloc_id, task, namespace, command)?;
        let mut request = url.as_str().into_client_request()?;
        let headers = request.headers_mut();
        if let Some(token) = self.config.token.as_deref().filter(|t| !t.is_empty()) {
            headers.insert(
                TOKEN_HEADER,
                HeaderValue::from_str(token).map_err(|_| NomadError::InvalidHeader(TOKEN_HEADER))?,
            );
        }
        if let Some(auth) = self.config.http_auth.as_deref() {
            let value = format!("Basic {}", STANDARD.encode(auth));
            headers.insert(
                "Authorization",
                HeaderValue::from_str(&value).map_err(|_| NomadError::InvalidHeader("Authorization"))?,
            );
        }

        let (socket, _) = connect_async(request).await?;
        debug!(alloc_id, task, "exec websocket connected");
        let (mut sink, mut source) = socket.split();

        let (input_tx, mut input_rx) = mpsc::unbounded_channel::<ExecInput>();
        let (output_tx, output_rx) = mpsc::channel(OUTPUT_CAPACITY);
        let heartbeat = CancellationToken::new();

        tokio::spawn(async move {
            while let Some(frame) = input_rx.recv().await {
                let text = match frame.encode() {
                    Ok(text) => text,
                    Err(err) => {
                        warn!(error = %err, "could not encode exec frame");
                        continue;
                    }
                };
                if sink.send(Message::Text(text)).await.is_err() {
                    return;
                }
            }
            let _ = sink.close().await;
        });

        let reader_heartbeat = heartbeat.clone();
        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    () = output_tx.closed() => break,
                    next = source.next() => next,
                };
                let frame = match next {
                    Some(Ok(Message::Text(text))) => ExecOutput::decode(&text).map_err(NomadError::from),
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => ExecOutput::decode(text).map_err(NomadError::from),
                        Err(_) => continue,
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => Err(NomadError::from(err)),
                };
                let done = matches!(frame, Err(_) | Ok(ExecOutput::Exited { .. }));
                if output_tx.send(frame).await.is_err() || done {
                    break;
                }
            }
            reader_heartbeat.cancel();
        });

        spawn_heartbeat(input_tx.clone(), heartbeat.clone(), HEARTBEAT_PERIOD);

        Ok(ExecSession {
            writer: ExecWriter::new(input_tx, heartbeat),
            reader: ExecReader::new(output_rx),
        })
    }
}

/// Send a keepalive every `period` until `token` is cancelled
fn spawn_heartbeat(
    input: mpsc::UnboundedSender<ExecInput>,
    token: CancellationToken,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = ticker.tick() => {
                    if input.send(ExecInput::Heartbeat).is_err() {
                        break;
                    }
                }
            }
        }
        debug!("exec heartbeat stopped");
    })
}
