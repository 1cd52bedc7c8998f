//! Log and event stream handles.
//!
//! Opening a stream spawns a pump task that reads the HTTP body and forwards
//! decoded chunks into a bounded channel. The handle owns the receiving end:
//! a read consumes the handle and hands it back with the chunk, so a handle
//! can only ever have one read outstanding. Dropping the handle closes the
//! channel, which stops the pump and with it the HTTP connection.

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{NomadError, NomadResult};
use crate::formatting::take_utf8;
use crate::models::{EventRecord, LogKind, Topics, decode_event_line};

/// Chunks buffered between a pump and its reader
const FEED_CAPACITY: usize = 16;

/// What a log stream is following
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSubscription {
    pub alloc_id: String,
    pub task: String,
    pub kind: LogKind,
}

/// A followed task log; each read yields the next raw text chunk
#[derive(Debug)]
pub struct LogsStream {
    pub subscription: LogSubscription,
    rx: mpsc::Receiver<NomadResult<String>>,
}

impl LogsStream {
    pub(super) fn spawn(response: reqwest::Response, subscription: LogSubscription) -> Self {
        Self::from_body(response.bytes_stream(), subscription)
    }

    /// Build a stream over any byte source
    pub fn from_body<S, B, E>(body: S, subscription: LogSubscription) -> Self
    where
        S: Stream<Item = Result<B, E>> + Send + 'static,
        B: AsRef<[u8]> + Send + 'static,
        E: Into<NomadError> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        tokio::spawn(pump_logs(body, tx));
        Self { subscription, rx }
    }

    /// Wait for the next chunk; `None` once the stream has ended
    pub async fn read(mut self) -> (Self, Option<NomadResult<String>>) {
        let chunk = self.rx.recv().await;
        (self, chunk)
    }
}

/// A subscription to the event stream; each read yields one batch of records
#[derive(Debug)]
pub struct EventsStream {
    pub topics: Topics,
    rx: mpsc::Receiver<NomadResult<Vec<EventRecord>>>,
}

impl EventsStream {
    pub(super) fn spawn(response: reqwest::Response, topics: Topics, fields: Vec<String>) -> Self {
        Self::from_body(response.bytes_stream(), topics, fields)
    }

    pub fn from_body<S, B, E>(body: S, topics: Topics, fields: Vec<String>) -> Self
    where
        S: Stream<Item = Result<B, E>> + Send + 'static,
        B: AsRef<[u8]> + Send + 'static,
        E: Into<NomadError> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        tokio::spawn(pump_events(body, fields, tx));
        Self { topics, rx }
    }

    pub async fn read(mut self) -> (Self, Option<NomadResult<Vec<EventRecord>>>) {
        let batch = self.rx.recv().await;
        (self, batch)
    }
}

async fn pump_logs<S, B, E>(body: S, tx: mpsc::Sender<NomadResult<String>>)
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<NomadError>,
{
    let mut body = std::pin::pin!(body);
    let mut pending = Vec::new();
    loop {
        let next = tokio::select! {
            () = tx.closed() => {
                debug!("log stream reader dropped, closing");
                return;
            }
            next = body.next() => next,
        };
        let chunk = match next {
            Some(Ok(bytes)) => {
                pending.extend_from_slice(bytes.as_ref());
                let text = take_utf8(&mut pending);
                if text.is_empty() {
                    continue;
                }
                Ok(text)
            }
            Some(Err(err)) => Err(err.into()),
            None => {
                debug!("log stream ended");
                return;
            }
        };
        let failed = chunk.is_err();
        if tx.send(chunk).await.is_err() || failed {
            return;
        }
    }
}

async fn pump_events<S, B, E>(body: S, fields: Vec<String>, tx: mpsc::Sender<NomadResult<Vec<EventRecord>>>)
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<NomadError>,
{
    let mut body = std::pin::pin!(body);
    let mut pending: Vec<u8> = Vec::new();
    loop {
        let next = tokio::select! {
            () = tx.closed() => {
                debug!("event stream reader dropped, closing");
                return;
            }
            next = body.next() => next,
        };
        let bytes = match next {
            Some(Ok(bytes)) => bytes,
            Some(Err(err)) => {
                let _ = tx.send(Err(err.into())).await;
                return;
            }
            None => {
                debug!("event stream ended");
                return;
            }
        };
        pending.extend_from_slice(bytes.as_ref());

        let mut batch = Vec::new();
        while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match decode_event_line(line, &fields) {
                Ok(records) => batch.extend(records),
                Err(err) => {
                    warn!(error = %err, "undecodable event frame");
                    if !batch.is_empty() && tx.send(Ok(batch)).await.is_err() {
                        return;
                    }
                    let _ = tx.send(Err(err.into())).await;
                    return;
                }
            }
        }

        if !batch.is_empty() && tx.send(Ok(batch)).await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription() -> LogSubscription {
        LogSubscription {
            alloc_id: "a1".to_string(),
            task: "web".to_string(),
            kind: LogKind::Stdout,
        }
    }

    fn chunks(parts: &[&[u8]]) -> impl Stream<Item = Result<Vec<u8>, NomadError>> + Send + 'static {
        let owned: Vec<Result<Vec<u8>, NomadError>> = parts.iter().map(|p| Ok(p.to_vec())).collect();
        futures::stream::iter(owned)
    }

    #[tokio::test]
    async fn test_logs_stream_reads_in_order_then_ends() {
        let stream = LogsStream::from_body(chunks(&[b"one\ntw", b"o\n"]), subscription());
        let (stream, first) = stream.read().await;
        assert_eq!(first.unwrap().unwrap(), "one\ntw");
        let (stream, second) = stream.read().await;
        assert_eq!(second.unwrap().unwrap(), "o\n");
        let (_, end) = stream.read().await;
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_logs_stream_error_ends_stream() {
        let body = futures::stream::iter(vec![
            Ok(b"x".to_vec()),
            Err(NomadError::StreamClosed),
            Ok(b"never".to_vec()),
        ]);
        let stream = LogsStream::from_body(body, subscription());
        let (stream, first) = stream.read().await;
        assert_eq!(first.unwrap().unwrap(), "x");
        let (stream, second) = stream.read().await;
        assert!(matches!(second, Some(Err(NomadError::StreamClosed))));
        let (_, end) = stream.read().await;
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_events_stream_reassembles_split_lines() {
        let fields = vec!["Topic".to_string(), "Key".to_string()];
        let body = chunks(&[
            b"{}\n{\"Index\":1,\"Events\":[{\"Topic\":\"Job\",",
            b"\"Key\":\"web\"}]}\n{}\n",
        ]);
        let topics = Topics::parse("Job:web").unwrap();
        let stream = EventsStream::from_body(body, topics.clone(), fields);
        assert_eq!(stream.topics, topics);
        let (stream, batch) = stream.read().await;
        let batch = batch.unwrap().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].projected, "Job  web");
        let (_, end) = stream.read().await;
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_events_stream_delivers_records_before_decode_error() {
        let body = chunks(&[b"{\"Index\":3,\"Events\":[{\"Topic\":\"Job\"}]}\nnot json\n"]);
        let stream = EventsStream::from_body(body, Topics::default(), vec!["Topic".to_string()]);
        let (stream, batch) = stream.read().await;
        let batch = batch.unwrap().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].projected, "Job");
        let (stream, failed) = stream.read().await;
        assert!(matches!(failed, Some(Err(NomadError::Decode(_)))));
        let (_, end) = stream.read().await;
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_events_stream_reports_decode_error() {
        let body = chunks(&[b"not json\n"]);
        let stream = EventsStream::from_body(body, Topics::default(), vec!["Topic".to_string()]);
        let (_, batch) = stream.read().await;
        assert!(matches!(batch, Some(Err(NomadError::Decode(_)))));
    }
}
