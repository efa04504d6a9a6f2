//! Configuration management for fanwatchd.
//!
//! Uses figment to merge configuration from multiple sources:
//! 1. Default values
//! 2. Config file (TOML)
//! 3. Environment variables
//! 4. Command-line arguments

use fanotify_codec::{EventMask, Verdict};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors found while interpreting otherwise well-formed configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown event name: {0}")]
    UnknownEvent(String),

    #[error("invalid verdict {0:?}, expected \"allow\" or \"deny\"")]
    InvalidVerdict(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Daemon configuration
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Permission decisions for `guard`
    #[serde(default)]
    pub guard: GuardConfig,

    /// Paths marked at startup
    #[serde(default)]
    pub watch: Vec<WatchConfig>,
}

/// Daemon-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Size of the buffer handed to each read of the fanotify descriptor
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

/// Guard policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Uids whose processes are always allowed
    #[serde(default = "default_allowed_uids")]
    pub allowed_uids: Vec<u32>,

    /// Verdict for every other process ("allow" or "deny")
    #[serde(default = "default_verdict")]
    pub default_verdict: String,

    /// Ask the kernel to audit decisions
    #[serde(default)]
    pub audit: bool,
}

/// Marked path configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Path to mark
    pub path: PathBuf,

    /// Mark the whole mount rather than the single object
    #[serde(default)]
    pub mount: bool,

    /// Event names to listen for (used by `watch`)
    #[serde(default = "default_events")]
    pub events: Vec<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_buffer_size() -> usize {
    4096
}

fn default_allowed_uids() -> Vec<u32> {
    vec![0]
}

fn default_verdict() -> String {
    "deny".to_string()
}

fn default_events() -> Vec<String> {
    vec!["open".to_string()]
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            allowed_uids: default_allowed_uids(),
            default_verdict: default_verdict(),
            audit: false,
        }
    }
}

impl GuardConfig {
    /// Parse `default_verdict` into verdict bits.
    pub fn default_verdict(&self) -> Result<Verdict, ConfigError> {
        parse_verdict(&self.default_verdict)
    }
}

impl WatchConfig {
    /// Combine the configured event names into one mask.
    pub fn event_mask(&self) -> Result<EventMask, ConfigError> {
        parse_events(&self.events)
    }
}

/// Parse "allow"/"deny" into verdict bits.
pub fn parse_verdict(value: &str) -> Result<Verdict, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "allow" => Ok(Verdict::FAN_ALLOW),
        "deny" => Ok(Verdict::FAN_DENY),
        _ => Err(ConfigError::InvalidVerdict(value.to_string())),
    }
}

/// Combine event names into one mask.
fn parse_events(names: &[String]) -> Result<EventMask, ConfigError> {
    names.iter().try_fold(EventMask::empty(), |mask, name| {
        EventMask::from_event_name(name)
            .map(|m| mask | m)
            .ok_or_else(|| ConfigError::UnknownEvent(name.clone()))
    })
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_file: Option<&PathBuf>) -> Result<Self, figment::Error> {
        Self::figment(config_file).extract()
    }

    fn figment(config_file: Option<&PathBuf>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Add config file if provided
        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(path));
        } else {
            // Try default config locations
            let default_paths = [
                PathBuf::from("/etc/fanwatch/config.toml"),
                dirs::config_dir()
                    .unwrap_or_default()
                    .join("fanwatch/config.toml"),
            ];

            for path in &default_paths {
                if path.exists() {
                    figment = figment.merge(Toml::file(path));
                    break;
                }
            }
        }

        // Environment variables (FANWATCHD_ prefix), e.g. FANWATCHD_DAEMON__LOG_LEVEL
        figment.merge(Env::prefixed("FANWATCHD_").split("__"))
    }

    /// Override log level from CLI
    pub fn with_log_level(mut self, log_level: Option<String>) -> Self {
        if let Some(level) = log_level {
            self.daemon.log_level = level;
        }
        self
    }

    /// Override read buffer size from CLI
    pub fn with_buffer_size(mut self, buffer_size: Option<usize>) -> Self {
        if let Some(size) = buffer_size {
            self.daemon.buffer_size = size;
        }
        self
    }

    /// Add paths given on the command line
    pub fn with_paths(mut self, paths: &[PathBuf], mount: bool, events: &[String]) -> Self {
        let events = if events.is_empty() {
            default_events()
        } else {
            events.to_vec()
        };
        self.watch.extend(paths.iter().map(|path| WatchConfig {
            path: path.clone(),
            mount,
            events: events.clone(),
        }));
        self
    }

    /// Override guard policy from CLI
    pub fn with_guard(
        mut self,
        allow_uids: &[u32],
        default_verdict: Option<String>,
        audit: bool,
    ) -> Self {
        if !allow_uids.is_empty() {
            self.guard.allowed_uids = allow_uids.to_vec();
        }
        if let Some(verdict) = default_verdict {
            self.guard.default_verdict = verdict;
        }
        self.guard.audit |= audit;
        self
    }
}
