//! Configuration types for the TUI.
//!
//! Settings are layered: built-in defaults, `/etc/nomon/config.toml`, the user
//! config file, environment variables, and finally command-line flags (applied
//! by `main`). Once the TUI starts the resulting [`TuiConfig`] is never mutated.

use std::path::PathBuf;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use super::event::Topics;

/// TUI configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TuiConfig {
    pub nomad: NomadConfig,

    pub refresh: RefreshConfig,

    pub logs: LogsConfig,

    pub events: EventsConfig,

    pub display: DisplayConfig,
}

/// Connection settings for the Nomad HTTP API
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NomadConfig {
    /// Base URL of the agent, e.g. `http://127.0.0.1:4646`
    pub address: String,

    /// ACL token sent as `X-Nomad-Token`
    pub token: Option<String>,

    pub region: Option<String>,

    /// Namespace used for listings; `*` means all namespaces
    pub namespace: String,

    /// HTTP basic auth as `user:password`
    pub http_auth: Option<String>,

    /// PEM bundle used to verify the agent's certificate
    pub ca_cert: Option<PathBuf>,

    pub skip_verify: bool,
}

impl Default for NomadConfig {
    fn default() -> Self {
        Self {
            address: "http://127.0.0.1:4646".to_string(),
            token: None,
            region: None,
            namespace: "*".to_string(),
            http_auth: None,
            ca_cert: None,
            skip_verify: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Seconds between automatic reloads of reloadable pages
    pub update_seconds: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self { update_seconds: 2 }
    }
}

/// Minimum allowed refresh interval in seconds (prevents tight polling loops)
const MIN_REFRESH_INTERVAL: u64 = 1;

/// Validate that an interval value meets the minimum requirement.
/// In non-strict mode, corrects invalid values to the default and adds a warning.
/// In strict mode, returns an error for invalid values.
fn validate_interval(
    value: &mut u64,
    field: &str,
    min: u64,
    default: u64,
    strict: bool,
    warnings: &mut Vec<String>,
) -> Result<(), String> {
    if *value < min {
        let msg = format!("{field} must be at least {min} second(s), got {value}");
        if strict {
            return Err(msg);
        }
        warnings.push(format!("{msg} - using default ({default})"));
        *value = default;
    }
    Ok(())
}

impl RefreshConfig {
    /// Validate refresh configuration values.
    /// Returns a list of warnings for invalid values that were corrected to defaults.
    /// If `strict` is true, returns Err instead of correcting values.
    pub fn validate(&mut self, strict: bool) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();
        validate_interval(
            &mut self.update_seconds,
            "refresh.update_seconds",
            MIN_REFRESH_INTERVAL,
            Self::default().update_seconds,
            strict,
            &mut warnings,
        )?;
        Ok(warnings)
    }

    #[must_use]
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.update_seconds.max(MIN_REFRESH_INTERVAL))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogsConfig {
    /// Bytes back from the end of the log to start reading at
    pub offset: u64,

    /// Keep following the log after the initial read
    pub tail: bool,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            offset: 1_000_000,
            tail: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Topic filter for the all-events page, e.g. `Job:*,Allocation:*`
    pub topics: String,

    pub namespace: String,

    /// Event fields shown in each row, in order
    pub fields: Vec<String>,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            topics: "Job,Allocation,Deployment,Evaluation".to_string(),
            namespace: "*".to_string(),
            fields: ["Topic", "Type", "Key", "Index"]
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

impl EventsConfig {
    /// Parsed topic filter
    ///
    /// Falls back to the default topics if the configured value is invalid;
    /// `validate` has already reported that case.
    #[must_use]
    pub fn topic_filter(&self) -> Topics {
        Topics::parse(&self.topics)
            .or_else(|_| Topics::parse(&Self::default().topics))
            .unwrap_or_default()
    }

    pub fn validate(&mut self, strict: bool) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();
        let defaults = Self::default();

        if let Err(e) = Topics::parse(&self.topics) {
            let msg = format!("events.topics is invalid: {e}");
            if strict {
                return Err(msg);
            }
            warnings.push(format!("{msg} - using default ({})", defaults.topics));
            self.topics = defaults.topics;
        }

        if self.fields.iter().all(|f| f.trim().is_empty()) {
            let msg = "events.fields must name at least one field".to_string();
            if strict {
                return Err(msg);
            }
            warnings.push(format!("{msg} - using default"));
            self.fields = defaults.fields;
        }

        Ok(warnings)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Start on the all-tasks page instead of the jobs page
    pub start_all_tasks: bool,

    /// Start with the header block hidden
    pub start_compact: bool,

    /// Theme name
    pub theme: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            start_all_tasks: false,
            start_compact: false,
            theme: "dark".to_string(),
        }
    }
}

impl TuiConfig {
    /// Get the user config file path, respecting XDG_CONFIG_HOME
    ///
    /// Resolution order:
    /// 1. $XDG_CONFIG_HOME/nomon/config.toml (if XDG_CONFIG_HOME is set)
    /// 2. $HOME/.config/nomon/config.toml (if HOME is set)
    /// 3. dirs::config_dir()/nomon/config.toml
    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
            && !xdg_config.is_empty()
        {
            return Some(PathBuf::from(xdg_config).join("nomon/config.toml"));
        }

        if let Some(home) = std::env::var_os("HOME") {
            return Some(PathBuf::from(home).join(".config/nomon/config.toml"));
        }

        dirs::config_dir().map(|dir| dir.join("nomon/config.toml"))
    }

    /// Load configuration from files and environment.
    ///
    /// Returns the config and any warnings encountered during loading. With
    /// `NOMON_STRICT_CONFIG` set, anything that would be a warning is an error.
    pub fn load() -> anyhow::Result<(Self, Vec<String>)> {
        let mut config = Self::default();
        let mut warnings = Vec::new();
        let strict = Self::is_strict_mode();

        config.load_config_file(&PathBuf::from("/etc/nomon/config.toml"), strict, &mut warnings)?;

        if let Some(user_path) = Self::user_config_path() {
            config.load_config_file(&user_path, strict, &mut warnings)?;
        }

        config.apply_env_overrides(strict, &mut warnings)?;

        let validation = config
            .validate(strict)
            .map_err(|e| anyhow::anyhow!("{e} (NOMON_STRICT_CONFIG is set - config errors are fatal)"))?;
        warnings.extend(validation);

        Ok((config, warnings))
    }

    /// Validate every section, collecting warnings for corrected values
    pub fn validate(&mut self, strict: bool) -> Result<Vec<String>, String> {
        let mut warnings = self.refresh.validate(strict)?;
        warnings.extend(self.events.validate(strict)?);

        if self.nomad.address.trim().is_empty() {
            let msg = "nomad.address must not be empty".to_string();
            if strict {
                return Err(msg);
            }
            warnings.push(format!("{msg} - using default"));
            self.nomad.address = NomadConfig::default().address;
        }

        if !matches!(self.display.theme.to_lowercase().as_str(), "dark" | "light") {
            let msg = format!("display.theme '{}' is unknown", self.display.theme);
            if strict {
                return Err(msg);
            }
            warnings.push(format!("{msg} - using dark"));
            self.display.theme = "dark".to_string();
        }

        Ok(warnings)
    }

    /// Check if strict config mode is enabled via NOMON_STRICT_CONFIG
    fn is_strict_mode() -> bool {
        std::env::var("NOMON_STRICT_CONFIG")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    /// Load a config file, collecting warnings on parse errors but not on missing files.
    fn load_config_file(
        &mut self,
        path: &std::path::Path,
        strict: bool,
        warnings: &mut Vec<String>,
    ) -> anyhow::Result<()> {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<TuiConfig>(&content) {
                Ok(parsed) => *self = parsed,
                Err(e) if strict => {
                    return Err(e).with_context(|| {
                        format!("Failed to parse config file '{}'", path.display())
                    });
                }
                Err(e) => {
                    warnings.push(format!("Config parse error in '{}': {}", path.display(), e));
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) if strict => {
                return Err(e).with_context(|| {
                    format!("Could not read config file '{}'", path.display())
                });
            }
            Err(e) => {
                warnings.push(format!("Could not read config '{}': {}", path.display(), e));
            }
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self, strict: bool, warnings: &mut Vec<String>) -> anyhow::Result<()> {
        let env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        if let Some(val) = env("NOMAD_ADDR") {
            self.nomad.address = val;
        }
        if let Some(val) = env("NOMAD_TOKEN") {
            self.nomad.token = Some(val);
        }
        if let Some(val) = env("NOMAD_REGION") {
            self.nomad.region = Some(val);
        }
        if let Some(val) = env("NOMAD_NAMESPACE") {
            self.nomad.namespace = val;
        }
        if let Some(val) = env("NOMAD_HTTP_AUTH") {
            self.nomad.http_auth = Some(val);
        }
        if let Some(val) = env("NOMAD_CACERT") {
            self.nomad.ca_cert = Some(PathBuf::from(val));
        }
        if let Some(val) = env("NOMAD_SKIP_VERIFY") {
            match parse_bool(&val) {
                Some(b) => self.nomad.skip_verify = b,
                None => report_env_error(strict, warnings, "NOMAD_SKIP_VERIFY", &val, "expected true or false")?,
            }
        }

        if let Some(val) = env("NOMON_UPDATE_SECONDS") {
            match val.parse::<u64>() {
                Ok(secs) if secs >= MIN_REFRESH_INTERVAL => self.refresh.update_seconds = secs,
                Ok(_) => report_env_error(
                    strict,
                    warnings,
                    "NOMON_UPDATE_SECONDS",
                    &val,
                    &format!("must be at least {MIN_REFRESH_INTERVAL} second(s)"),
                )?,
                Err(_) => report_env_error(
                    strict,
                    warnings,
                    "NOMON_UPDATE_SECONDS",
                    &val,
                    "expected a positive integer (seconds)",
                )?,
            }
        }

        if let Some(val) = env("NOMON_LOG_OFFSET") {
            match val.parse::<u64>() {
                Ok(offset) => self.logs.offset = offset,
                Err(_) => report_env_error(strict, warnings, "NOMON_LOG_OFFSET", &val, "expected a byte count")?,
            }
        }
        if let Some(val) = env("NOMON_LOG_TAIL") {
            match parse_bool(&val) {
                Some(b) => self.logs.tail = b,
                None => report_env_error(strict, warnings, "NOMON_LOG_TAIL", &val, "expected true or false")?,
            }
        }

        if let Some(val) = env("NOMON_EVENT_TOPICS") {
            self.events.topics = val;
        }
        if let Some(val) = env("NOMON_EVENT_NAMESPACE") {
            self.events.namespace = val;
        }
        if let Some(val) = env("NOMON_THEME") {
            self.display.theme = val;
        }

        Ok(())
    }
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Report an environment variable error, failing if strict mode is enabled
fn report_env_error(
    strict: bool,
    warnings: &mut Vec<String>,
    var_name: &str,
    value: &str,
    reason: &str,
) -> anyhow::Result<()> {
    if strict {
        bail!("Invalid value '{value}' for {var_name}: {reason} (NOMON_STRICT_CONFIG is set - config errors are fatal)");
    }
    warnings.push(format!("Invalid value '{value}' for {var_name}, {reason} - using default"));
    Ok(())
}
