//! Command handlers.

pub mod config;
pub mod models;
pub mod serve;

use std::path::{Path, PathBuf};

use screen_analysis_core::{Config, ConfigError};

/// Resolve the config file location: the `--config` flag if given
/// (with `~` expanded), otherwise the platform default.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned()),
        None => Config::default_path(),
    }
}

/// Load configuration.
///
/// An explicit path must exist. The default location falls back to
/// built-in defaults when no file is present.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    match explicit {
        Some(_) => Config::load_from(&config_path(explicit)),
        None => Config::load(),
    }
}
