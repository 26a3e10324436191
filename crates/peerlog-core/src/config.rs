//! Configuration system for peerlog.
//!
//! Resolution order: command-line flags → environment variables → config file → defaults.
//! Flags are applied by the daemon after `load()`.
//!
//! Config file location:
//!   1. $PEERLOG_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/peerlog/config.toml
//!   3. ~/.config/peerlog/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default findpeer RPC of a local node.
pub const DEFAULT_RESOLVER_ENDPOINT: &str = "http://127.0.0.1:5001/api/v0/dht/findpeer";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerlogConfig {
    pub source: SourceConfig,
    pub content: ContentConfig,
    pub output: OutputConfig,
    pub resolver: ResolverConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Node log file to follow. Required.
    pub log_path: Option<PathBuf>,
    /// Read lines already in the file before following. Off = attach at EOF.
    pub from_beginning: bool,
    /// How long the follower sleeps at EOF before polling again.
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// JSON object mapping CID → { filename, filetype }. Required.
    pub table_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root of the record tree.
    pub dir: PathBuf,
    /// Rename unparsable records aside instead of overwriting them.
    pub quarantine_corrupt: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// false = extraction-only mode: events are logged, never resolved or stored.
    pub enabled: bool,
    pub endpoint: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 1 = strictly sequential. >1 = sharded worker pool.
    pub workers: usize,
    /// Per-worker queue bound; also the line channel bound.
    pub queue_capacity: usize,
    /// Stats log interval. 0 = never.
    pub stats_interval_secs: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            log_path: None,
            from_beginning: false,
            poll_interval_ms: 250,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data"),
            quarantine_corrupt: true,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: DEFAULT_RESOLVER_ENDPOINT.to_string(),
            timeout_secs: 15,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            queue_capacity: 1024,
            stats_interval_secs: 60,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("peerlog")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("{0} is required")]
    Missing(&'static str),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl PeerlogConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_file(&Self::file_path())?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load a config file named on the command line: env vars → file.
    /// The file must exist.
    pub fn load_explicit(path: &std::path::Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_required(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a config file, or return defaults if it does not exist.
    pub fn load_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_required(path)
    }

    /// Parse a config file that must exist.
    pub fn load_required(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("PEERLOG_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config to `path` if none exists.
    pub fn write_default_if_missing(path: &std::path::Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
        }
        let text =
            toml::to_string_pretty(&Self::default()).map_err(ConfigError::SerializeFailed)?;
        std::fs::write(path, text).map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))
    }

    /// Apply PEERLOG_* overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let flag = |v: String| v == "true" || v == "1";

        if let Some(v) = lookup("PEERLOG_SOURCE__LOG_PATH") {
            self.source.log_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("PEERLOG_SOURCE__FROM_BEGINNING") {
            self.source.from_beginning = flag(v);
        }
        if let Some(v) = lookup("PEERLOG_CONTENT__TABLE_PATH") {
            self.content.table_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("PEERLOG_OUTPUT__DIR") {
            self.output.dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("PEERLOG_RESOLVER__ENABLED") {
            self.resolver.enabled = flag(v);
        }
        if let Some(v) = lookup("PEERLOG_RESOLVER__ENDPOINT") {
            self.resolver.endpoint = v;
        }
        if let Some(v) = lookup("PEERLOG_PIPELINE__WORKERS") {
            if let Ok(n) = v.parse() {
                self.pipeline.workers = n;
            }
        }
    }

    /// Paths the daemon cannot start without.
    pub fn required_paths(&self) -> Result<(PathBuf, PathBuf), ConfigError> {
        let log = self
            .source
            .log_path
            .clone()
            .ok_or(ConfigError::Missing("source.log_path"))?;
        let table = self
            .content
            .table_path
            .clone()
            .ok_or(ConfigError::Missing("content.table_path"))?;
        Ok((log, table))
    }
}
