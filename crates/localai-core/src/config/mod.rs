//! Configuration file types, defaults and validation.
//!
//! The configuration is a single JSON document. Every section defaults, so a
//! missing file or a partial document is valid. Directory fields left unset
//! are filled from the platform defaults by the composition root.

mod extra_args;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use extra_args::{DANGEROUS_ARG_FRAGMENTS, parse_extra_args, validate_extra_args};

use crate::catalog::{CatalogError, ModelCatalog};
use crate::domain::{ModelDefinition, ResolvedSelection};
use crate::error::CoreError;

/// Default bind address.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8080;

/// Name of the Steam process log.
pub const DEFAULT_STEAM_LOG_FILE: &str = "gameprocess_log.txt";

const CONFIG_VERSION: &str = "2.0.0";

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read configuration {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Invalid configuration {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("Failed to write configuration {path}: {reason}")]
    Write { path: String, reason: String },

    #[error("Port must be between 1024 and 65535, got {0}")]
    InvalidPort(u16),

    #[error("Host must not be empty")]
    EmptyHost,

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("Context size {requested} exceeds the maximum {max} of model '{model}'")]
    ContextTooLarge {
        model: String,
        requested: u32,
        max: u32,
    },

    #[error("Context size must be greater than zero")]
    ZeroContext,

    #[error("Could not parse extra arguments: {0}")]
    ExtraArgsSyntax(String),

    #[error("Potentially dangerous extra argument rejected: '{0}'")]
    DangerousArgument(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl From<ConfigError> for CoreError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Catalog(inner) => inner.into(),
            other => Self::Config(other.to_string()),
        }
    }
}

/// Root configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub version: String,
    pub server: ServerSettings,
    pub steam: SteamSettings,
    /// Declared models, in declaration order.
    pub models: Vec<ModelDefinition>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            server: ServerSettings::default(),
            steam: SteamSettings::default(),
            models: Vec::new(),
        }
    }
}

impl SystemConfig {
    /// Configuration written by `config init` and used when no file exists.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            models: default_models(),
            ..Self::default()
        }
    }

    /// Build and validate the model catalog.
    pub fn catalog(&self) -> Result<ModelCatalog, CatalogError> {
        ModelCatalog::load(self.models.clone(), self.server.default_model.clone())
    }
}

/// `server` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Root scanned for model files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models_dir: Option<PathBuf>,
    /// Preferred model for automatic selection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    /// Server binary; looked up on `PATH` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llama_server_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    /// Grace period between the termination request and a forced kill.
    pub stop_grace_secs: u64,
    /// How long a background start waits for the health endpoint.
    pub startup_timeout_secs: u64,
    /// How long to wait for the cross-invocation state lock.
    pub lock_timeout_ms: u64,
    /// Probe the health endpoint before reporting a background start.
    pub wait_for_ready: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            models_dir: None,
            default_model: None,
            llama_server_path: None,
            cache_dir: None,
            log_dir: None,
            stop_grace_secs: 10,
            startup_timeout_secs: 60,
            lock_timeout_ms: 2000,
            wait_for_ready: true,
        }
    }
}

impl ServerSettings {
    pub const fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }

    pub const fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// `steam` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteamSettings {
    pub enabled: bool,
    /// Suspend the server while a game runs.
    pub stop_ai_on_game: bool,
    /// Resume the server once the game has exited and settled.
    pub restart_ai_after_game: bool,
    /// Directory holding Steam logs; detected when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steam_logs_dir: Option<PathBuf>,
    pub log_file: String,
    /// Quiet period after a game exits before resuming.
    pub settle_secs: u64,
    pub poll_interval_ms: u64,
    /// Upper bound of the retry delay on log read errors.
    pub max_backoff_secs: u64,
    /// Process names terminated when a game launches.
    pub processes_to_kill: Vec<String>,
}

impl Default for SteamSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            stop_ai_on_game: true,
            restart_ai_after_game: true,
            steam_logs_dir: None,
            log_file: DEFAULT_STEAM_LOG_FILE.to_string(),
            settle_secs: 15,
            poll_interval_ms: 1000,
            max_backoff_secs: 30,
            processes_to_kill: Vec::new(),
        }
    }
}

impl SteamSettings {
    pub const fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub const fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

/// Built-in model definitions.
pub fn default_models() -> Vec<ModelDefinition> {
    let mut qwen_7b = ModelDefinition::new(
        "qwen-7b",
        "Qwen2.5 Coder 7B Instruct",
        r"qwen2\.5.*coder.*7b.*\.gguf$",
    )
    .with_priority(1)
    .with_ctx_size(32768)
    .with_draft("qwen-0.5b");
    qwen_7b.description = "General coding assistant".to_string();
    qwen_7b.draft_ngram_min = Some(4);
    qwen_7b.tags = vec!["coding".to_string()];

    let mut qwen_small = ModelDefinition::new(
        "qwen-0.5b",
        "Qwen2.5 Coder 0.5B Instruct",
        r"qwen2\.5.*coder.*0\.5b.*\.gguf$",
    )
    .with_ctx_size(32768);
    qwen_small.description = "Draft model for speculative decoding".to_string();
    qwen_small.tags = vec!["draft".to_string()];

    let mut nanbeige = ModelDefinition::new("nanbeige-3b", "Nanbeige 3B", r"nanbeige.*3b.*\.gguf$")
        .with_priority(3);
    nanbeige.tags = vec!["chat".to_string()];

    vec![qwen_7b, qwen_small, nanbeige]
}

/// Check value ranges and the model catalog.
pub fn validate_config(config: &SystemConfig) -> Result<(), ConfigError> {
    if config.server.port < 1024 {
        return Err(ConfigError::InvalidPort(config.server.port));
    }
    if config.server.host.trim().is_empty() {
        return Err(ConfigError::EmptyHost);
    }
    if config.server.lock_timeout_ms == 0 {
        return Err(ConfigError::ZeroDuration {
            field: "server.lock_timeout_ms",
        });
    }
    if config.server.stop_grace_secs == 0 {
        return Err(ConfigError::ZeroDuration {
            field: "server.stop_grace_secs",
        });
    }
    if config.server.startup_timeout_secs == 0 {
        return Err(ConfigError::ZeroDuration {
            field: "server.startup_timeout_secs",
        });
    }
    if config.steam.poll_interval_ms == 0 {
        return Err(ConfigError::ZeroDuration {
            field: "steam.poll_interval_ms",
        });
    }
    if config.steam.max_backoff_secs == 0 {
        return Err(ConfigError::ZeroDuration {
            field: "steam.max_backoff_secs",
        });
    }
    config.catalog()?;
    Ok(())
}

/// Load and validate the configuration at `path`.
///
/// A missing file yields [`SystemConfig::with_defaults`].
pub fn load_config(path: &Path) -> Result<SystemConfig, ConfigError> {
    if !path.exists() {
        return Ok(SystemConfig::with_defaults());
    }
    let raw = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let config: SystemConfig = serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Write `config` as pretty JSON, creating parent directories.
pub fn save_config(config: &SystemConfig, path: &Path) -> Result<(), ConfigError> {
    let write_err = |e: &dyn std::fmt::Display| ConfigError::Write {
        path: path.display().to_string(),
        reason: e.to_string(),
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| write_err(&e))?;
    }
    let json = serde_json::to_string_pretty(config).map_err(|e| write_err(&e))?;
    fs::write(path, json).map_err(|e| write_err(&e))
}

/// Apply a `--context` override, which may only shrink the model's window.
pub fn override_context(
    selection: ResolvedSelection,
    ctx_size: Option<u32>,
) -> Result<ResolvedSelection, ConfigError> {
    let Some(requested) = ctx_size else {
        return Ok(selection);
    };
    if requested == 0 {
        return Err(ConfigError::ZeroContext);
    }
    let max = selection.primary.definition.ctx_size;
    if requested > max {
        return Err(ConfigError::ContextTooLarge {
            model: selection.id().to_string(),
            requested,
            max,
        });
    }
    Ok(selection.with_ctx_size(requested))
}
