//! Logging initialization and configuration.
//!
//! Uses the `tracing` ecosystem for structured logging with support for
//! both human-readable and JSON output formats.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging subsystem.
///
/// # Arguments
///
/// * `level` - Default filter directive (`trace`, `debug`, `info`, `warn`, `error`).
/// * `json_format` - If true, outputs structured JSON logs; otherwise pretty-printed.
///
/// # Notes
///
/// - Log output goes to stderr (stdout is reserved for command output)
/// - The RUST_LOG environment variable can override the log level
pub fn init(level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Initialize logging with settings from the `[logging]` config section.
/// `-v` forces debug output and `--json-logs` forces JSON.
pub fn init_from_config(
    config: &screen_analysis_core::Config,
    verbose_override: bool,
    json_logs_override: bool,
) {
    let (level, json_format) = resolve(config, verbose_override, json_logs_override);
    init(level, json_format);
}

fn resolve<'a>(
    config: &'a screen_analysis_core::Config,
    verbose_override: bool,
    json_logs_override: bool,
) -> (&'a str, bool) {
    let level = if verbose_override {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let json_format = json_logs_override || config.logging.format == "json";
    (level, json_format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use screen_analysis_core::Config;

    #[test]
    fn test_resolve_defaults() {
        assert_eq!(resolve(&Config::default(), false, false), ("info", false));
    }

    #[test]
    fn test_resolve_from_config() {
        let mut config = Config::default();
        config.logging.level = "trace".to_string();
        config.logging.format = "json".to_string();
        assert_eq!(resolve(&config, false, false), ("trace", true));
    }

    #[test]
    fn test_resolve_keeps_quieter_levels() {
        let mut config = Config::default();
        config.logging.level = "warn".to_string();
        assert_eq!(resolve(&config, false, false), ("warn", false));
        config.logging.level = "error".to_string();
        assert_eq!(resolve(&config, false, false), ("error", false));
    }

    #[test]
    fn test_resolve_cli_overrides() {
        let mut config = Config::default();
        config.logging.level = "error".to_string();
        assert_eq!(resolve(&config, true, true), ("debug", true));
    }
}
