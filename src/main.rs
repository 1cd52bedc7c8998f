//! nomon - interactive terminal dashboard for Nomad

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use nomon::models::TuiConfig;

#[derive(Parser)]
#[command(name = "nomon")]
#[command(about = "Interactive terminal dashboard for Nomad", long_about = None)]
#[command(version)]
struct Cli {
    /// Nomad HTTP API address
    #[arg(long, value_name = "URL")]
    addr: Option<String>,

    /// ACL token sent as X-Nomad-Token
    #[arg(long, value_name = "TOKEN")]
    token: Option<String>,

    /// Region to query
    #[arg(long)]
    region: Option<String>,

    /// Namespace to browse (`*` for all)
    #[arg(short, long)]
    namespace: Option<String>,

    /// Seconds between page refreshes
    #[arg(short, long, value_name = "SECONDS")]
    update: Option<u64>,

    /// Bytes back from the end of a log to start at
    #[arg(long, value_name = "BYTES")]
    log_offset: Option<u64>,

    /// Follow logs after the initial read
    #[arg(long, value_name = "BOOL")]
    log_tail: Option<bool>,

    /// Start on the all-tasks page instead of jobs
    #[arg(long)]
    all_tasks: bool,

    /// Start in compact mode (header hidden)
    #[arg(long)]
    compact: bool,

    /// Event topics, e.g. `Job:*,Allocation:*`
    #[arg(long, value_name = "TOPICS")]
    event_topics: Option<String>,

    /// Namespace for the all-events page
    #[arg(long, value_name = "NAMESPACE")]
    event_namespace: Option<String>,

    /// Write debug logs to this file
    #[arg(long, value_name = "PATH", env = "NOMON_LOG_FILE")]
    log_file: Option<PathBuf>,
}

impl Cli {
    /// Flags win over config files and environment
    fn apply(self, config: &mut TuiConfig) {
        if let Some(addr) = self.addr {
            config.nomad.address = addr;
        }
        if let Some(token) = self.token {
            config.nomad.token = Some(token);
        }
        if let Some(region) = self.region {
            config.nomad.region = Some(region);
        }
        if let Some(namespace) = self.namespace {
            config.nomad.namespace = namespace;
        }
        if let Some(update) = self.update {
            config.refresh.update_seconds = update;
        }
        if let Some(offset) = self.log_offset {
            config.logs.offset = offset;
        }
        if let Some(tail) = self.log_tail {
            config.logs.tail = tail;
        }
        if self.all_tasks {
            config.display.start_all_tasks = true;
        }
        if self.compact {
            config.display.start_compact = true;
        }
        if let Some(topics) = self.event_topics {
            config.events.topics = topics;
        }
        if let Some(namespace) = self.event_namespace {
            config.events.namespace = namespace;
        }
    }
}

/// Log to a file; the TUI owns the terminal
fn init_logging(path: &Path) -> Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Could not open log file '{}'", path.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env("NOMON_LOG_LEVEL"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .try_init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.log_file {
        init_logging(path)?;
    }

    let (mut config, mut warnings) = TuiConfig::load()?;
    cli.apply(&mut config);

    // Flags may have introduced out-of-range values
    let strict = std::env::var("NOMON_STRICT_CONFIG").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    let corrected = config.validate(strict).map_err(|e| anyhow::anyhow!(e))?;
    warnings.extend(corrected);

    for warning in &warnings {
        tracing::warn!("{warning}");
    }

    nomon::tui::run(config, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "nomon",
            "--addr",
            "https://nomad.example:4646",
            "-n",
            "prod",
            "--all-tasks",
            "--log-tail",
            "false",
        ]);
        let mut config = TuiConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.nomad.address, "https://nomad.example:4646");
        assert_eq!(config.nomad.namespace, "prod");
        assert!(config.display.start_all_tasks);
        assert!(!config.logs.tail);
        assert!(!config.display.start_compact);
    }
}
