//! Configuration management for the Pulse dashboard.
//!
//! The service reads a single configuration file at `~/.pulse/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Explicit config file values
//! 2. Environment variables (PULSE_* prefix)
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `PULSE_HOST` → server.host
//! - `PULSE_PORT` → server.port
//! - `PULSE_DB_PATH` → database.path
//! - `PULSE_JWT_SECRET` → auth.jwt_secret
//! - `PULSE_JWT_AUDIENCE` → auth.audience
//! - `PULSE_LOG_LEVEL` → observability.log_level
//! - `PULSE_LOG_FORMAT` → observability.log_format

use crate::error::{Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".pulse"),
        |dirs| dirs.home_dir().join(".pulse"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration for the dashboard service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Token verification settings
    #[serde(default)]
    pub auth: AuthConfig,

    /// Logging settings
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .context(format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable fallbacks.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("PULSE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PULSE_PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid PULSE_PORT"),
            }
        }
        if let Some(path) = lookup("PULSE_DB_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }
        if let Some(secret) = lookup("PULSE_JWT_SECRET") {
            self.auth.jwt_secret = Some(secret);
        }
        if let Some(audience) = lookup("PULSE_JWT_AUDIENCE") {
            self.auth.audience = Some(audience);
        }
        if let Some(level) = lookup("PULSE_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("PULSE_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }

    /// Bind address in `host:port` form.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Resolved SQLite database path.
    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| config_dir().join("pulse.db"))
    }
}

// ============================================================================
// Sections
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file path (defaults to `~/.pulse/pulse.db`)
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Token verification configuration.
///
/// Tokens are issued by the hosted auth provider and only verified here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret shared with the auth provider
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Expected `aud` claim; audience is not checked when unset
    #[serde(default)]
    pub audience: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets to clamp to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    4480
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}
