//! Event types for the TUI
//!
//! This module implements a dual-channel event architecture:
//! - InputEvent: Priority channel for user input (never dropped)
//! - DataEvent: Results of asynchronous work, each tagged with the page
//!   activation it was issued under

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent};

use crate::models::{EventRecord, ExecOutput};
use crate::nomad::exec::ExecReader;
use crate::nomad::{EventsStream, ExecSession, LogsStream, NomadResult};
use crate::tui::fetch::PageData;
use crate::tui::poll::Activation;

/// Input events from the terminal (priority channel - never dropped)
#[derive(Debug, Clone)]
pub enum InputEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    /// Terminal resize (columns, rows)
    Resize(u16, u16),
}

/// Results of asynchronous operations
///
/// Stream reads hand their stream back so the next read can be issued once the
/// chunk has been applied; a stale stream is simply dropped by the handler.
#[derive(Debug)]
pub enum DataEvent {
    /// Once-a-second tick used to expire toasts
    Tick,

    PageLoaded {
        activation: Activation,
        result: NomadResult<PageData>,
    },

    LogChunk {
        activation: Activation,
        stream: LogsStream,
        chunk: Option<NomadResult<String>>,
    },

    EventBatch {
        activation: Activation,
        stream: EventsStream,
        batch: Option<NomadResult<Vec<EventRecord>>>,
    },

    /// A delayed refresh fired
    RefreshDue { activation: Activation },

    ExecConnected {
        activation: Activation,
        result: NomadResult<ExecSession>,
    },

    ExecFrame {
        activation: Activation,
        reader: ExecReader,
        frame: Option<NomadResult<ExecOutput>>,
    },
}

/// Result of processing an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    /// Continue running, UI needs redraw
    Continue,
    /// Continue running, no UI change needed
    Unchanged,
    /// Quit the application
    Quit,
}

/// Key action mappings for the TUI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    // Navigation
    MoveUp,
    MoveDown,
    MoveToTop,
    MoveToBottom,
    PageUp,
    PageDown,

    // Page graph
    Forward,
    Back,
    Reload,

    // Shortcut pages
    OpenExec,
    OpenStats,
    OpenSpec,
    OpenMeta,
    OpenEvents,
    OpenAllEvents,
    ToggleMode,
    ShowStdout,
    ShowStderr,

    // UI
    ToggleCompact,
    OpenFilter,
    ShowHelp,
    Quit,

    // Text input (filter, exec prompt)
    Submit,
    Escape,
    InputClear,
    InputBackspace,
    InputChar(char),

    // Mouse actions
    MouseScrollUp,
    MouseScrollDown,

    Unknown,
}

impl KeyAction {
    /// Map a mouse event to an action
    pub fn from_mouse_event(event: MouseEvent) -> Self {
        use crossterm::event::MouseEventKind;

        match event.kind {
            MouseEventKind::ScrollUp => KeyAction::MouseScrollUp,
            MouseEventKind::ScrollDown => KeyAction::MouseScrollDown,
            _ => KeyAction::Unknown,
        }
    }

    /// Map a key event to an action based on current mode
    ///
    /// While a text input has focus only ctrl+c quits; `q` is just a letter.
    pub fn from_key_event(event: KeyEvent, in_text_input: bool) -> Self {
        let KeyEvent {
            code, modifiers, ..
        } = event;
        let ctrl = modifiers.contains(KeyModifiers::CONTROL);

        if in_text_input {
            return match code {
                KeyCode::Char('c') if ctrl => KeyAction::Quit,
                KeyCode::Char('u') if ctrl => KeyAction::InputClear,
                KeyCode::Esc => KeyAction::Escape,
                KeyCode::Enter => KeyAction::Submit,
                KeyCode::Backspace => KeyAction::InputBackspace,
                KeyCode::Char(c) if !ctrl => KeyAction::InputChar(c),
                _ => KeyAction::Unknown,
            };
        }

        match code {
            KeyCode::Char('q') => KeyAction::Quit,

            // Ctrl+ combinations must come before bare character matches
            KeyCode::Char('c') if ctrl => KeyAction::Quit,
            KeyCode::Char('d') if ctrl => KeyAction::PageDown,
            KeyCode::Char('u') if ctrl => KeyAction::PageUp,

            KeyCode::Char('j') | KeyCode::Down => KeyAction::MoveDown,
            KeyCode::Char('k') | KeyCode::Up => KeyAction::MoveUp,
            KeyCode::Char('g') | KeyCode::Home => KeyAction::MoveToTop,
            KeyCode::Char('G') | KeyCode::End => KeyAction::MoveToBottom,
            KeyCode::PageDown => KeyAction::PageDown,
            KeyCode::PageUp => KeyAction::PageUp,

            KeyCode::Enter => KeyAction::Forward,
            KeyCode::Esc => KeyAction::Back,
            KeyCode::Char('r') => KeyAction::Reload,

            KeyCode::Char('e') => KeyAction::OpenExec,
            KeyCode::Char('s') => KeyAction::OpenStats,
            KeyCode::Char('v') => KeyAction::OpenSpec,
            KeyCode::Char('m') => KeyAction::OpenMeta,
            KeyCode::Char('E') => KeyAction::OpenEvents,
            KeyCode::Char('a') => KeyAction::OpenAllEvents,
            KeyCode::Char('t') => KeyAction::ToggleMode,
            KeyCode::Char('1') => KeyAction::ShowStdout,
            KeyCode::Char('2') => KeyAction::ShowStderr,

            KeyCode::Char('c') => KeyAction::ToggleCompact,
            KeyCode::Char('/') => KeyAction::OpenFilter,
            KeyCode::Char('?') | KeyCode::F(1) => KeyAction::ShowHelp,

            _ => KeyAction::Unknown,
        }
    }
}
