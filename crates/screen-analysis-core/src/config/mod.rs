//! Configuration management for Screen Analysis.
//!
//! Configuration is loaded from the platform config directory
//! (e.g. `~/.config/screen-analysis/config.toml`) with sensible defaults.
//! Every section implements `Default`, so a partial file is fine.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Template and static file locations
    pub paths: PathsConfig,

    /// Image limits
    pub limits: LimitsConfig,

    /// Remote LLM backend settings
    pub remote: RemoteConfig,

    /// Local model backend settings
    pub local: LocalConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.screen-analysis.screen-analysis/config.toml
    /// - Linux: ~/.config/screen-analysis/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\screen-analysis\config\config.toml
    ///
    /// Falls back to ~/.screen-analysis/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "screen-analysis", "screen-analysis")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home)
                    .join(".screen-analysis")
                    .join("config.toml")
            })
    }

    /// Get the resolved model directory path (with ~ expansion).
    pub fn model_dir(&self) -> PathBuf {
        expand(&self.local.model_dir)
    }

    /// Directory holding the files of the configured local model.
    pub fn local_model_path(&self) -> PathBuf {
        self.model_dir().join(&self.local.model)
    }

    /// Get the resolved templates directory (with ~ expansion).
    pub fn templates_dir(&self) -> PathBuf {
        expand(&self.paths.templates_dir)
    }

    /// Get the resolved static files directory (with ~ expansion).
    pub fn static_dir(&self) -> PathBuf {
        expand(&self.paths.static_dir)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn expand(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    let expanded = shellexpand::tilde(&path_str);
    PathBuf::from(expanded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.limits.max_pixels, 1_800_000);
        assert_eq!(config.remote.timeout_secs, 300);
        assert_eq!(config.remote.model, "llava");
        assert!(!config.local.preload);
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[server]"));
        assert!(toml.contains("[remote]"));
        assert!(toml.contains("[local]"));
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[remote]\nendpoint = \"http://gpu-box:11434\"\n\n[server]\nport = 9000\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.remote.endpoint, "http://gpu-box:11434");
        assert_eq!(config.remote.model, "llava");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[limits]\nmax_pixels = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_load_rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_local_model_path_joins_model_name() {
        let mut config = Config::default();
        config.local.model_dir = PathBuf::from("/opt/models");
        assert_eq!(
            config.local_model_path(),
            PathBuf::from("/opt/models/pix2struct-screen2words-base")
        );
    }

    #[test]
    fn test_model_dir_expands_tilde() {
        let config = Config::default();
        assert!(!config.model_dir().to_string_lossy().starts_with('~'));
    }
}
