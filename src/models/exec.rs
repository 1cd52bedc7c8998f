//! Exec websocket frames.
//!
//! Nomad's exec endpoint speaks JSON text frames. Output and input bytes are
//! base64 encoded inside `{"stdout": {"data": ...}}` style objects.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Frame sent from the TUI to the remote task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecInput {
    /// Raw keystroke bytes
    Stdin(Vec<u8>),
    /// Close the remote stdin
    CloseStdin,
    /// Terminal size in rows and columns
    TtySize { height: u16, width: u16 },
    /// Keepalive
    Heartbeat,
}

#[derive(Serialize)]
struct StdinFrame {
    stdin: StdinPayload,
}

#[derive(Serialize)]
struct StdinPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    close: bool,
}

#[derive(Serialize)]
struct TtySizeFrame {
    tty_size: TtySize,
}

#[derive(Serialize)]
struct TtySize {
    height: u16,
    width: u16,
}

impl ExecInput {
    /// Serialize to the JSON text sent over the websocket
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        match self {
            ExecInput::Stdin(bytes) => serde_json::to_string(&StdinFrame {
                stdin: StdinPayload {
                    data: Some(STANDARD.encode(bytes)),
                    close: false,
                },
            }),
            ExecInput::CloseStdin => serde_json::to_string(&StdinFrame {
                stdin: StdinPayload {
                    data: None,
                    close: true,
                },
            }),
            ExecInput::TtySize { height, width } => serde_json::to_string(&TtySizeFrame {
                tty_size: TtySize {
                    height: *height,
                    width: *width,
                },
            }),
            ExecInput::Heartbeat => Ok("{}".to_string()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawOutputFrame {
    stdout: Option<RawData>,
    stderr: Option<RawData>,
    exited: bool,
    result: Option<RawResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawData {
    data: Option<String>,
    close: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawResult {
    exit_code: i32,
}

/// Which remote output stream a chunk belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Decoded frame received from the remote task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutput {
    Data { stream: OutputStream, bytes: Vec<u8> },
    /// The remote process exited; the session is over
    Exited { exit_code: Option<i32> },
    /// Frame with nothing to show (heartbeat echo, stream close notice)
    Empty,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid exec frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid base64 in exec frame: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl ExecOutput {
    /// Decode one websocket text frame
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        let raw: RawOutputFrame = serde_json::from_str(text)?;
        if raw.exited {
            return Ok(ExecOutput::Exited {
                exit_code: raw.result.map(|r| r.exit_code),
            });
        }
        for (stream, data) in [
            (OutputStream::Stdout, raw.stdout),
            (OutputStream::Stderr, raw.stderr),
        ] {
            if let Some(RawData {
                data: Some(encoded),
                ..
            }) = data
            {
                return Ok(ExecOutput::Data {
                    stream,
                    bytes: STANDARD.decode(encoded)?,
                });
            }
        }
        Ok(ExecOutput::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_stdin() {
        let frame = ExecInput::Stdin(b"ls\n".to_vec()).encode().unwrap();
        assert_eq!(frame, r#"{"stdin":{"data":"bHMK"}}"#);
    }

    #[test]
    fn test_encode_close_and_resize() {
        assert_eq!(
            ExecInput::CloseStdin.encode().unwrap(),
            r#"{"stdin":{"close":true}}"#
        );
        assert_eq!(
            ExecInput::TtySize { height: 23, width: 80 }.encode().unwrap(),
            r#"{"tty_size":{"height":23,"width":80}}"#
        );
        assert_eq!(ExecInput::Heartbeat.encode().unwrap(), "{}");
    }

    #[test]
    fn test_decode_stdout_and_stderr() {
        assert_eq!(
            ExecOutput::decode(r#"{"stdout":{"data":"Zm9v"}}"#).unwrap(),
            ExecOutput::Data {
                stream: OutputStream::Stdout,
                bytes: b"foo".to_vec()
            }
        );
        assert_eq!(
            ExecOutput::decode(r#"{"stderr":{"data":"YmFy"}}"#).unwrap(),
            ExecOutput::Data {
                stream: OutputStream::Stderr,
                bytes: b"bar".to_vec()
            }
        );
    }

    #[test]
    fn test_decode_exit() {
        assert_eq!(
            ExecOutput::decode(r#"{"exited":true,"result":{"exit_code":3}}"#).unwrap(),
            ExecOutput::Exited { exit_code: Some(3) }
        );
    }

    #[test]
    fn test_decode_close_notice_is_empty() {
        assert_eq!(
            ExecOutput::decode(r#"{"stdout":{"close":true}}"#).unwrap(),
            ExecOutput::Empty
        );
        assert_eq!(ExecOutput::decode("{}").unwrap(), ExecOutput::Empty);
    }

    #[test]
    fn test_decode_bad_base64() {
        assert!(matches!(
            ExecOutput::decode(r#"{"stdout":{"data":"!!"}}"#),
            Err(FrameError::Base64(_))
        ));
    }
}
