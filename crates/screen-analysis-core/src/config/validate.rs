//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

const DEVICES: &[&str] = &["auto", "cpu", "cuda"];
const LOG_FORMATS: &[&str] = &["pretty", "json"];
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server.port must be > 0".into(),
            ));
        }
        if self.server.max_body_mb == 0 {
            return Err(ConfigError::ValidationError(
                "server.max_body_mb must be > 0".into(),
            ));
        }
        if self.limits.max_pixels == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_pixels must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if self.remote.endpoint.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "remote.endpoint must not be empty".into(),
            ));
        }
        if self.remote.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "remote.timeout_secs must be > 0".into(),
            ));
        }
        if self.local.max_patches == 0 {
            return Err(ConfigError::ValidationError(
                "local.max_patches must be > 0".into(),
            ));
        }
        if self.local.max_new_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "local.max_new_tokens must be > 0".into(),
            ));
        }
        if !DEVICES.contains(&self.local.device.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "local.device must be one of {DEVICES:?}, got {:?}",
                self.local.device
            )));
        }
        for origin in &self.server.cors_origins {
            if origin != "*" && !origin.starts_with("http://") && !origin.starts_with("https://") {
                return Err(ConfigError::ValidationError(format!(
                    "server.cors_origins entries must be \"*\" or an http(s) origin, got {origin:?}"
                )));
            }
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of {LOG_LEVELS:?}, got {:?}",
                self.logging.level
            )));
        }
        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.format must be one of {LOG_FORMATS:?}, got {:?}",
                self.logging.format
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_max_pixels() {
        let mut config = Config::default();
        config.limits.max_pixels = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_pixels"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.remote.timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn test_validate_rejects_empty_endpoint() {
        let mut config = Config::default();
        config.remote.endpoint = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("remote.endpoint"));
    }

    #[test]
    fn test_validate_rejects_unknown_device() {
        let mut config = Config::default();
        config.local.device = "tpu".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("local.device"));
    }

    #[test]
    fn test_validate_rejects_unknown_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("logging.format"));
    }

    #[test]
    fn test_validate_accepts_every_log_level() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            let mut config = Config::default();
            config.logging.level = level.to_string();
            assert!(config.validate().is_ok(), "{level} rejected");
        }
    }

    #[test]
    fn test_validate_rejects_unknown_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("logging.level"));
    }

    #[test]
    fn test_validate_cors_origins() {
        let mut config = Config::default();
        config.server.cors_origins = vec!["https://dashboard.example".to_string()];
        assert!(config.validate().is_ok());

        config.server.cors_origins = vec!["dashboard.example".to_string()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.cors_origins"));
    }
}
