//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::protocol::QuestionMode;
use crate::transport::ReconnectPolicy;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,

    /// Give up after this many reconnect attempts; unset retries forever
    #[serde(default)]
    pub max_reconnect_attempts: Option<u32>,

    #[serde(default)]
    pub mode: QuestionMode,

    #[serde(default = "default_answer_timeout")]
    pub answer_timeout_secs: u64,
}

fn default_endpoint() -> String {
    "ws://localhost:8000/ws".to_string()
}

fn default_reconnect_delay() -> u64 {
    3000 // 3 seconds
}

fn default_answer_timeout() -> u64 {
    120
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            reconnect_delay_ms: default_reconnect_delay(),
            max_reconnect_attempts: None,
            mode: QuestionMode::default(),
            answer_timeout_secs: default_answer_timeout(),
        }
    }
}

impl ConnectionConfig {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::from_settings(self.reconnect_delay_ms, self.max_reconnect_attempts)
    }
}

/// Answer rendering configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_true")]
    pub markdown: bool,

    #[serde(default = "default_true")]
    pub math: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            markdown: true,
            math: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    ///
    /// A config file that exists but cannot be read or parsed is an error
    /// rather than a silent fallback to defaults.
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load_first(&default_config_paths())
    }

    /// Load the first existing file in `paths`, or defaults plus environment
    fn load_first(paths: &[PathBuf]) -> Result<Self, ConfigError> {
        match paths.iter().find(|path| path.exists()) {
            Some(path) => {
                let config = Self::load_with_env(path)?;
                tracing::info!("Loaded config from {:?}", path);
                Ok(config)
            }
            None => {
                tracing::debug!("Using default config with environment overrides");
                Ok(Self::from_env())
            }
        }
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Connection overrides
        if let Some(endpoint) = var("CHATLINE_ENDPOINT") {
            self.connection.endpoint = endpoint;
        }
        if let Some(mode) = var("CHATLINE_MODE") {
            match mode.parse() {
                Ok(mode) => self.connection.mode = mode,
                Err(e) => tracing::warn!("Ignoring CHATLINE_MODE: {}", e),
            }
        }
        if let Some(delay) = var("CHATLINE_RECONNECT_DELAY_MS") {
            if let Ok(ms) = delay.parse() {
                self.connection.reconnect_delay_ms = ms;
            }
        }
        if let Some(max) = var("CHATLINE_MAX_RECONNECT_ATTEMPTS") {
            if let Ok(n) = max.parse() {
                self.connection.max_reconnect_attempts = Some(n);
            }
        }

        // Logging overrides
        if let Some(level) = var("CHATLINE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("CHATLINE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Search order for `Config::load_default`
fn default_config_paths() -> Vec<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("chatline").join("config.toml"))
        .into_iter()
        .chain(std::iter::once(PathBuf::from("./chatline.toml")))
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Chatline Configuration
#
# Environment variables override these settings:
# - CHATLINE_ENDPOINT
# - CHATLINE_MODE
# - CHATLINE_RECONNECT_DELAY_MS
# - CHATLINE_MAX_RECONNECT_ATTEMPTS
# - CHATLINE_LOG_LEVEL
# - CHATLINE_LOG_FORMAT

[connection]
# Chat backend websocket endpoint
endpoint = "ws://localhost:8000/ws"

# Delay before each reconnect attempt (ms)
reconnect_delay_ms = 3000

# Give up after this many reconnect attempts (unset = retry forever)
# max_reconnect_attempts = 10

# Question mode: auto (streamed, generated) or masked (extractive)
mode = "auto"

# How long `chatline ask` waits for a complete answer (seconds)
answer_timeout_secs = 120

[render]
# Render answers as markdown
markdown = true

# Render $...$ and $$...$$ as math
math = true

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
