//! Configuration module for the Firewatch console
//!
//! This module handles application configuration including:
//! - The `firewatch.toml` configuration file (transports, chart, logging)
//! - Console state persistence (last used port/stream) across sessions
//! - Environment variable overrides for scripted deployments
//!
//! # App Data Location
//!
//! Application data is stored in the platform-appropriate location:
//! - **Linux**: `~/.local/share/firewatch-rs/`
//! - **macOS**: `~/Library/Application Support/firewatch-rs/`
//! - **Windows**: `%APPDATA%\firewatch-rs\`
//!
//! # Files
//!
//! - `firewatch.toml` - Configuration (an explicit `--config` path wins)
//! - `console_state.json` - Last used transport details
//!
//! # Environment Overrides
//!
//! - `FIREWATCH_PORT` - Serial port to prefer
//! - `FIREWATCH_EVENTS_URL` - Event-stream URL to prefer

use crate::error::{FirewatchError, Result};
use crate::transport::serial::DEFAULT_BAUD_RATE;
use crate::types::CHART_WINDOW;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for data directories
pub const APP_ID: &str = "firewatch-rs";

/// Configuration filename
pub const CONFIG_FILE: &str = "firewatch.toml";

/// Console state filename
pub const STATE_FILE: &str = "console_state.json";

/// Default event-stream endpoint: the node's access-point address
pub const DEFAULT_STREAM_URL: &str = "http://192.168.4.1/events";

/// Default stream reconnect delay in milliseconds
pub const DEFAULT_RETRY_MS: u64 = 3000;

/// Environment variable overriding the serial port
pub const ENV_PORT: &str = "FIREWATCH_PORT";

/// Environment variable overriding the event-stream URL
pub const ENV_EVENTS_URL: &str = "FIREWATCH_EVENTS_URL";

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        FirewatchError::Config("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            FirewatchError::Config(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

/// Get the default path of the configuration file
pub fn config_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

/// Get the path of the console state file
pub fn state_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(STATE_FILE))
}

// ==================== Configuration ====================

/// Serial transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Port to open when a connect request names none; `None` falls back
    /// to the first enumerated port
    pub port: Option<String>,
    /// Baud rate; the node's firmware talks at 115200
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

/// Event-stream transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// SSE endpoint serving one record per event
    pub url: String,
    /// Reconnect delay when the server has not sent a `retry:` hint
    pub retry_ms: u64,
    /// Open the stream at startup without waiting for a command
    pub auto_connect: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_STREAM_URL.to_string(),
            retry_ms: DEFAULT_RETRY_MS,
            auto_connect: true,
        }
    }
}

impl StreamConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_ms)
    }
}

/// Chart configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Number of points the rolling chart retains
    pub window: usize,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            window: CHART_WINDOW,
        }
    }
}

/// Log file configuration; console logging is always on
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Directory for rotating log files; `None` disables file logging
    pub directory: Option<PathBuf>,
    /// Log file name prefix
    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_prefix: "firewatch.log".to_string(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub serial: SerialConfig,
    pub stream: StreamConfig,
    pub chart: ChartConfig,
    pub log: LogConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FirewatchError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        toml::from_str(&content).map_err(|e| {
            FirewatchError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Load configuration, returning defaults when no file exists or it
    /// fails to parse. An explicitly given path wins over the default
    /// location.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path {
            Some(explicit) => explicit.to_path_buf(),
            None => match config_path() {
                Some(default) if default.exists() => default,
                _ => return Self::default(),
            },
        };

        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| FirewatchError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            FirewatchError::Config(format!("Failed to write {}: {}", path.display(), e))
        })
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var(ENV_PORT) {
            if !port.is_empty() {
                self.serial.port = Some(port);
            }
        }
        if let Ok(url) = std::env::var(ENV_EVENTS_URL) {
            if !url.is_empty() {
                self.stream.url = url;
            }
        }
    }
}

// ==================== Console State ====================

/// Persistent console state
///
/// Remembers which transport the console last used so the next session
/// can offer it again. Distinct from configuration: this is history, not
/// intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleState {
    /// Version for future migration support
    #[serde(default = "default_state_version")]
    pub version: u32,

    /// Last serial port successfully requested
    #[serde(default)]
    pub last_port: Option<String>,

    /// Last event-stream URL successfully requested
    #[serde(default)]
    pub last_stream_url: Option<String>,
}

fn default_state_version() -> u32 {
    1
}

impl Default for ConsoleState {
    fn default() -> Self {
        Self {
            version: 1,
            last_port: None,
            last_stream_url: None,
        }
    }
}

impl ConsoleState {
    /// Load console state from the default location
    pub fn load() -> Result<Self> {
        let path = state_path().ok_or_else(|| {
            FirewatchError::Config("Could not determine console state path".to_string())
        })?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| FirewatchError::Config(format!("Failed to read console state: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| FirewatchError::Config(format!("Failed to parse console state: {}", e)))
    }

    /// Load console state, returning defaults on any error
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load console state, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save console state to the default location
    pub fn save(&self) -> Result<()> {
        let dir = ensure_app_data_dir()?;
        let path = dir.join(STATE_FILE);

        let content = serde_json::to_string_pretty(self).map_err(|e| {
            FirewatchError::Config(format!("Failed to serialize console state: {}", e))
        })?;

        std::fs::write(&path, content)
            .map_err(|e| FirewatchError::Config(format!("Failed to write console state: {}", e)))
    }
}
