//! CLI configuration file support
//!
//! Loads configuration from ~/.config/streamflow/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use streamflow_core::EngineConfig;

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Default settings
    #[serde(default)]
    pub default: DefaultConfig,
    /// Stream engine tuning
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Default configuration values
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultConfig {
    /// Default chat history file
    pub history_path: Option<String>,
    /// Default chat id
    pub chat_id: Option<String>,
    /// Default placeholder label
    pub label: Option<String>,
}

impl CliConfig {
    /// Load configuration from a specific path
    pub fn load_from_path(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring invalid config file");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Get the default configuration file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("streamflow").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_uses_defaults() {
        let config = CliConfig::load_from_path(Some(PathBuf::from("/nonexistent/streamflow.toml")));
        assert_eq!(config.engine, EngineConfig::default());
        assert!(config.default.chat_id.is_none());
    }

    #[test]
    fn reads_engine_and_default_tables() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[default]\nchat_id = \"support\"\n\n[engine]\nwatchdog_timeout_secs = 60\nmax_chunk_chars = 4"
        )
        .unwrap();

        let config = CliConfig::load_from_path(Some(file.path().to_path_buf()));
        assert_eq!(config.default.chat_id.as_deref(), Some("support"));
        assert_eq!(config.engine.watchdog_timeout_secs, 60);
        assert_eq!(config.engine.max_chunk_chars, 4);
        assert_eq!(config.engine.frame_interval_ms, EngineConfig::default().frame_interval_ms);
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[engine\nbroken").unwrap();
        let config = CliConfig::load_from_path(Some(file.path().to_path_buf()));
        assert_eq!(config.engine, EngineConfig::default());
    }
}
