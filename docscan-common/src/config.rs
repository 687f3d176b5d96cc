//! Configuration loading for the docscan gateway
//!
//! Settings are resolved in priority order:
//! 1. Command-line arguments (highest priority, see [`ConfigOverrides`])
//! 2. Environment variables (`DOCSCAN_*`)
//! 3. TOML config file
//! 4. Compiled defaults (fallback)
//!
//! A missing config file is not an error: the gateway logs a warning and
//! starts with defaults. A file that exists but cannot be read or parsed is.

use crate::batch::DEFAULT_BATCH_SIZE;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Config file name looked up under the platform config directory
pub const CONFIG_FILE_NAME: &str = "gateway.toml";

/// Gateway configuration
///
/// Every field has a compiled default, so a TOML file only needs to list the
/// settings it changes.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Interface the HTTP server binds to
    pub bind_address: String,

    /// HTTP server port
    pub port: u16,

    /// Base URL of the classification service (`/predict`, `/metadata`)
    pub classifier_url: String,

    /// Base URL of the PII scanning service
    pub pii_service_url: String,

    /// Directory holding uploaded files until they are dispatched
    pub upload_dir: PathBuf,

    /// Files dispatched together per batch
    pub batch_size: usize,

    /// Timeout for one outbound classification call
    pub request_timeout_ms: u64,

    /// Timeout for one PII service call; unset means no limit
    pub pii_timeout_ms: Option<u64>,

    /// Largest accepted upload body
    pub max_upload_bytes: usize,

    /// Outbound messages buffered per channel before a send waits
    pub channel_capacity: usize,

    /// Longest wait for room in a full channel before delivery is abandoned
    pub send_timeout_ms: u64,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 3000,
            classifier_url: "http://localhost:6000".to_string(),
            pii_service_url: "http://localhost:8009".to_string(),
            upload_dir: std::env::temp_dir().join("docscan-uploads"),
            batch_size: DEFAULT_BATCH_SIZE,
            request_timeout_ms: 20_000,
            pii_timeout_ms: None,
            max_upload_bytes: 64 * 1024 * 1024,
            channel_capacity: 32,
            send_timeout_ms: 10_000,
            logging: LoggingConfig::default(),
        }
    }
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub classifier_url: Option<String>,
    pub pii_service_url: Option<String>,
    pub upload_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl GatewayConfig {
    /// Resolve the full configuration
    ///
    /// `config_path` is the explicitly requested file (CLI or `DOCSCAN_CONFIG`);
    /// when absent the platform default location is tried.
    pub fn resolve(config_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                Some(path) => {
                    warn!(
                        "Config file {} not found, using defaults",
                        path.display()
                    );
                    Self::default()
                }
                None => {
                    warn!("Could not determine config directory, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env()?;
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse TOML content; missing keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Apply `DOCSCAN_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(v) = env_var("DOCSCAN_BIND_ADDRESS") {
            self.bind_address = v;
        }
        if let Some(v) = env_var("DOCSCAN_PORT") {
            self.port = parse_env("DOCSCAN_PORT", &v)?;
        }
        if let Some(v) = env_var("DOCSCAN_CLASSIFIER_URL") {
            self.classifier_url = v;
        }
        if let Some(v) = env_var("DOCSCAN_PII_SERVICE_URL") {
            self.pii_service_url = v;
        }
        if let Some(v) = env_var("DOCSCAN_UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = env_var("DOCSCAN_BATCH_SIZE") {
            self.batch_size = parse_env("DOCSCAN_BATCH_SIZE", &v)?;
        }
        if let Some(v) = env_var("DOCSCAN_REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = parse_env("DOCSCAN_REQUEST_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = env_var("DOCSCAN_PII_TIMEOUT_MS") {
            self.pii_timeout_ms = Some(parse_env("DOCSCAN_PII_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = env_var("DOCSCAN_SEND_TIMEOUT_MS") {
            self.send_timeout_ms = parse_env("DOCSCAN_SEND_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = env_var("DOCSCAN_LOG_LEVEL") {
            self.logging.level = v;
        }
        Ok(())
    }

    /// Apply command-line overrides
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(v) = overrides.bind_address {
            self.bind_address = v;
        }
        if let Some(v) = overrides.port {
            self.port = v;
        }
        if let Some(v) = overrides.classifier_url {
            self.classifier_url = v;
        }
        if let Some(v) = overrides.pii_service_url {
            self.pii_service_url = v;
        }
        if let Some(v) = overrides.upload_dir {
            self.upload_dir = v;
        }
        if let Some(v) = overrides.log_level {
            self.logging.level = v;
        }
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }
        if self.channel_capacity == 0 {
            return Err(Error::Config(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::Config(
                "request_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.send_timeout_ms == 0 {
            return Err(Error::Config(
                "send_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.pii_timeout_ms == Some(0) {
            return Err(Error::Config(
                "pii_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn pii_timeout(&self) -> Option<Duration> {
        self.pii_timeout_ms.map(Duration::from_millis)
    }

    /// `host:port` the server listens on
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Default config file location (`~/.config/docscan/gateway.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("docscan").join(CONFIG_FILE_NAME))
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {} ({})", name, value, e)))
}
