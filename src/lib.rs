//! nomon - interactive terminal dashboard for Nomad clusters
//!
//! The binary in `main.rs` loads configuration and hands off to [`tui::run`];
//! everything else lives here so it can be tested and benchmarked.

pub mod formatting;
pub mod models;
pub mod nomad;
pub mod tui;
