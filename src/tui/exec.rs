//! Exec page state
//!
//! The exec page moves through a small state machine: a command prompt, a
//! pending connection, a connected session (with or without keystrokes being
//! forwarded to the remote pty) and finally a closed session. The state lives
//! with the Exec page only; leaving the page drops it, which closes the
//! session.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::models::OutputStream;
use crate::nomad::exec::ExecWriter;
use crate::tui::app::Row;
use crate::tui::stream::TextFeed;

pub const PROMPT: &str = "Enter command: ";
pub const CLOSED_ROW: &str = "> session closed";

#[derive(Debug)]
pub enum ExecState {
    /// Waiting for the user to type a command
    Idle { input: String },
    Connecting,
    Connected(Connected),
    Closed,
}

impl Default for ExecState {
    fn default() -> Self {
        ExecState::Idle {
            input: String::new(),
        }
    }
}

/// A live session
#[derive(Debug)]
pub struct Connected {
    /// Keystrokes are forwarded to the remote pty
    pub in_pty: bool,
    stdout: TextFeed,
    stderr: TextFeed,
    pub writer: ExecWriter,
}

impl Connected {
    #[must_use]
    pub fn new(writer: ExecWriter) -> Self {
        Self {
            in_pty: true,
            stdout: TextFeed::dropping_bell_lines(),
            stderr: TextFeed::dropping_bell_lines(),
            writer,
        }
    }

    /// Splice raw output into the page rows, per stream
    ///
    /// Bell-only lines and terminal control sequences are dropped.
    pub fn append_output(&mut self, rows: &mut Vec<Row>, stream: OutputStream, bytes: &[u8]) {
        let feed = match stream {
            OutputStream::Stdout => &mut self.stdout,
            OutputStream::Stderr => &mut self.stderr,
        };
        feed.push_bytes(rows, bytes);
    }
}

impl ExecState {
    #[must_use]
    pub fn in_pty(&self) -> bool {
        matches!(self, ExecState::Connected(c) if c.in_pty)
    }

    #[must_use]
    pub fn entering_input(&self) -> bool {
        matches!(self, ExecState::Idle { .. })
    }
}

/// Bytes a keypress sends to the remote terminal
///
/// Returns `None` for keys with no terminal meaning (function keys and the like).
#[must_use]
pub fn encode_keypress(key: KeyEvent) -> Option<Vec<u8>> {
    let KeyEvent {
        code, modifiers, ..
    } = key;
    let bytes = match code {
        KeyCode::Enter => vec![b'\n'],
        KeyCode::Backspace if modifiers.contains(KeyModifiers::ALT) => vec![0x17],
        KeyCode::Backspace => vec![0x7f],
        KeyCode::Tab => vec![b'\t'],
        KeyCode::Up => b"\x1b[A".to_vec(),
        KeyCode::Down => b"\x1b[B".to_vec(),
        KeyCode::Right => b"\x1b[C".to_vec(),
        KeyCode::Left => b"\x1b[D".to_vec(),
        KeyCode::Char(c) if modifiers.contains(KeyModifiers::CONTROL) && c.is_ascii_alphabetic() => {
            vec![(c.to_ascii_lowercase() as u8) & 0x1f]
        }
        KeyCode::Char(c) => c.to_string().into_bytes(),
        _ => return None,
    };
    Some(bytes)
}

/// Split a command line into argv on whitespace
#[must_use]
pub fn split_command(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}
