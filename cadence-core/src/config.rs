//! YAML configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.cadence/
//!   config.yaml     (default config location)
//!   daemon.sock     (default status/control socket)
//! ```
//!
//! # API pattern
//!
//! Path-dependent functions come in two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Overrides `marathon.password` when set.
pub const PASSWORD_ENV: &str = "CADENCE_MARATHON_PASSWORD";

/// Placeholder in `validate_command` replaced with the candidate file path.
pub const CONFIG_PLACEHOLDER: &str = "{config}";

// ---------------------------------------------------------------------------
// 1. Model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub marathon: MarathonConfig,
    pub nginx: NginxConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
}

/// Where to reach the orchestrator. A single endpoint; no failover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarathonConfig {
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl MarathonConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Basic-auth pair, when a username is configured.
    pub fn credentials(&self) -> Option<(String, Option<String>)> {
        self.username
            .as_ref()
            .map(|user| (user.clone(), self.password.clone()))
    }
}

/// Proxy artifact and the commands that act on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NginxConfig {
    /// Template file overriding the embedded default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,
    /// Rendered configuration file.
    pub output: PathBuf,
    pub reload_command: Vec<String>,
    /// Run against the candidate file before it replaces `output`.
    /// `{config}` is replaced with the candidate path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate_command: Option<Vec<String>>,
    #[serde(default = "default_reload_timeout_secs")]
    pub reload_timeout_secs: u64,
}

impl NginxConfig {
    pub fn reload_timeout(&self) -> Duration {
        Duration::from_secs(self.reload_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Pending-trigger capacity; excess triggers collapse.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            queue_capacity: default_queue_capacity(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DaemonConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket: Option<PathBuf>,
}

fn default_request_timeout_secs() -> u64 {
    30
}
fn default_reload_timeout_secs() -> u64 {
    30
}
fn default_tick_interval_ms() -> u64 {
    2_000
}
fn default_queue_capacity() -> usize {
    2
}
fn default_reconnect_delay_ms() -> u64 {
    5_000
}

// ---------------------------------------------------------------------------
// 2. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.cadence/`
pub fn cadence_root(home: &Path) -> PathBuf {
    home.join(".cadence")
}

/// `<home>/.cadence/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    cadence_root(home).join("config.yaml")
}

/// `<home>/.cadence/daemon.sock`: pure, no I/O.
pub fn default_socket_path_at(home: &Path) -> PathBuf {
    cadence_root(home).join("daemon.sock")
}

// ---------------------------------------------------------------------------
// 3. Load
// ---------------------------------------------------------------------------

/// Load and validate the config at `path`.
///
/// Returns `ConfigError::NotFound` if absent, `ConfigError::Parse` (with
/// path + line context) if malformed, `ConfigError::Invalid` if a value is
/// unusable. The password environment override is applied before
/// validation.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    let mut config: Config = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        config.marathon.password = Some(password);
    }
    config.validate()?;
    Ok(config)
}

/// Load `<home>/.cadence/config.yaml`.
pub fn load_at(home: &Path) -> Result<Config, ConfigError> {
    load_from(&config_path_at(home))
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Config, ConfigError> {
    load_at(&home()?)
}

impl Config {
    /// Reject values the daemon cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = self.marathon.endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::Invalid("marathon.endpoint is empty".into()));
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "marathon.endpoint must be an http(s) URL, got '{endpoint}'"
            )));
        }
        if self.nginx.reload_command.is_empty() {
            return Err(ConfigError::Invalid("nginx.reload_command is empty".into()));
        }
        if let Some(validate) = &self.nginx.validate_command {
            if validate.is_empty() {
                return Err(ConfigError::Invalid(
                    "nginx.validate_command is empty; remove it or give a command".into(),
                ));
            }
        }
        if self.marathon.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("marathon.request_timeout_secs must be > 0".into()));
        }
        if self.nginx.reload_timeout_secs == 0 {
            return Err(ConfigError::Invalid("nginx.reload_timeout_secs must be > 0".into()));
        }
        if self.scheduler.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("scheduler.tick_interval_ms must be > 0".into()));
        }
        if self.scheduler.queue_capacity == 0 {
            return Err(ConfigError::Invalid("scheduler.queue_capacity must be > 0".into()));
        }
        Ok(())
    }

    /// Socket path from config, or `<home>/.cadence/daemon.sock`.
    pub fn socket_path_at(&self, home: &Path) -> PathBuf {
        self.daemon
            .socket
            .clone()
            .unwrap_or_else(|| default_socket_path_at(home))
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
