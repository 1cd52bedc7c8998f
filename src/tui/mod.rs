//! Terminal User Interface for nomon
//!
//! This module provides an interactive TUI for browsing a Nomad cluster.
//! It features:
//! - A page graph of jobs, tasks, specs, logs, events, stats and exec sessions
//! - Dual-channel event architecture (priority input, asynchronous results)
//! - Generation-tagged refreshes so stale results never overwrite the view
//! - Followed log and event streams with partial-line reassembly
//! - An interactive exec terminal into running tasks

pub mod app;
pub mod event;
pub mod exec;
pub mod fetch;
pub mod page;
pub mod poll;
pub mod runtime;
pub mod stream;
pub mod theme;
pub mod ui;

use std::io::{self, IsTerminal, stdout};

use anyhow::{Context, Result, bail};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use tracing::info;

use crate::models::TuiConfig;
use crate::nomad::NomadClient;
use crate::tui::app::App;
use crate::tui::runtime::{
    TuiRuntime, create_channels, run_event_loop, spawn_command, spawn_input_task, spawn_tick,
};

/// Terminal capability requirements for TUI mode
#[derive(Debug)]
pub struct TerminalCapabilities {
    pub is_tty: bool,
    pub term_type: String,
    pub supports_alternate_screen: bool,
}

impl TerminalCapabilities {
    /// Detect terminal capabilities
    pub fn detect() -> Self {
        let is_tty = stdout().is_terminal();
        let term_type = std::env::var("TERM").unwrap_or_default();
        Self::from_parts(is_tty, term_type)
    }

    fn from_parts(is_tty: bool, term_type: String) -> Self {
        // Check for known problematic terminals
        let supports_alternate_screen = !matches!(term_type.as_str(), "dumb" | "" | "unknown");

        Self {
            is_tty,
            term_type,
            supports_alternate_screen,
        }
    }

    /// Check if terminal is suitable for TUI mode
    pub fn is_suitable(&self) -> bool {
        self.is_tty && self.supports_alternate_screen
    }

    /// Get error message for unsuitable terminal
    pub fn error_message(&self) -> String {
        if !self.is_tty {
            "nomon requires an interactive terminal (stdout is not a TTY).".to_string()
        } else if !self.supports_alternate_screen {
            format!(
                "Terminal type '{}' may not support TUI mode.\n\
                 Hint: Set TERM to a supported value (e.g., xterm-256color).",
                if self.term_type.is_empty() {
                    "(unset)"
                } else {
                    &self.term_type
                }
            )
        } else {
            "Unknown terminal capability issue.".to_string()
        }
    }
}

/// Run the TUI application
pub async fn run_tui(config: TuiConfig, config_warnings: Vec<String>) -> Result<()> {
    let capabilities = TerminalCapabilities::detect();
    if !capabilities.is_suitable() {
        bail!("{}", capabilities.error_message());
    }

    let client = NomadClient::new(&config.nomad).context("Could not create the Nomad client")?;
    info!(address = %config.nomad.address, "starting nomon");

    let mut terminal = setup_terminal()?;
    let (width, height) = crossterm::terminal::size().unwrap_or((80, 24));
    let app = App::new(config, config_warnings).with_size(width, height);

    let (input_tx, input_rx, data_tx, data_rx) = create_channels();

    let mut runtime = TuiRuntime::new();
    runtime.track(spawn_input_task(input_tx, runtime.cancel_token()));
    runtime.track(spawn_tick(data_tx.clone(), runtime.cancel_token()));

    // Command tasks report exactly once and are not tracked; the ones still
    // running at exit hold only a stale activation.
    let dispatch = |command| {
        spawn_command(command, client.clone(), data_tx.clone());
    };

    let result = run_event_loop(app, input_rx, data_rx, dispatch, |app| {
        terminal.draw(|frame| ui::render(app, frame))?;
        Ok(())
    })
    .await;

    runtime.shutdown().await;

    // Restore even when the loop failed
    restore_terminal(&mut terminal)?;

    result
}

/// Setup the terminal for TUI mode
fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore the terminal to normal mode
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Run the TUI with the tokio runtime (entry point from main)
pub fn run(config: TuiConfig, config_warnings: Vec<String>) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_tui(config, config_warnings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dumb_terminal_is_rejected() {
        let caps = TerminalCapabilities::from_parts(true, "dumb".to_string());
        assert!(!caps.is_suitable());
        assert!(caps.error_message().contains("dumb"));

        let caps = TerminalCapabilities::from_parts(false, "xterm-256color".to_string());
        assert!(!caps.is_suitable());
        assert!(caps.error_message().contains("not a TTY"));

        assert!(TerminalCapabilities::from_parts(true, "xterm-256color".to_string()).is_suitable());
    }
}
