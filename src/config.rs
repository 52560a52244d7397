//! Server configuration.
//!
//! Loaded from an optional YAML file with environment-variable
//! overrides; every field has a default so a bare `crewflow` just runs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default port for the HTTP API.
pub const DEFAULT_PORT: u16 = 8990;

/// Default interval between hub liveness pulses, in seconds.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 60;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Address to bind the HTTP server to.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port for the HTTP API (default: 8990).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Seconds between liveness pulses on open event streams.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            db_path: default_db_path(),
            heartbeat_secs: default_heartbeat_secs(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_path() -> PathBuf {
    // CREWFLOW_DB > platform data dir > cwd
    if let Ok(path) = std::env::var("CREWFLOW_DB") {
        return PathBuf::from(path);
    }
    dirs::data_dir()
        .map(|dir| dir.join("crewflow").join("crewflow.db"))
        .unwrap_or_else(|| PathBuf::from("crewflow.db"))
}

fn default_heartbeat_secs() -> u64 {
    DEFAULT_HEARTBEAT_SECS
}

impl AppConfig {
    /// Load configuration from a YAML file, falling back to defaults
    /// when no path is given or the file does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let config: AppConfig = serde_yaml::from_str("port: 9000").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.bind, "127.0.0.1");
        assert_eq!(config.heartbeat_secs, DEFAULT_HEARTBEAT_SECS);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = AppConfig::load(Some(Path::new("/nonexistent/crewflow.yaml"))).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn loads_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bind: 0.0.0.0\nport: 9120\nheartbeat_secs: 15").unwrap();
        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.port, 9120);
        assert_eq!(config.heartbeat_secs, 15);
    }
}
