//! Telemetry configuration from environment variables.

use std::env;

/// Logging and metrics configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or an `EnvFilter`
    /// directive
    pub log_level: String,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,

    /// Whether to include file and line in log lines
    pub with_source: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "canton-bridge-relayer".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            with_source: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `CB_SERVICE_NAME`: Service name (default: canton-bridge-relayer)
    /// - `CB_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `CB_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    /// - `CB_LOG_SOURCE`: Include file and line (default: false)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("CB_SERVICE_NAME")
                .unwrap_or_else(|_| "canton-bridge-relayer".to_string()),

            log_level: env::var("CB_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("CB_JSON_LOGS")
                .map(|v| parse_flag(&v))
                .unwrap_or(is_container),

            with_source: env::var("CB_LOG_SOURCE")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "canton-bridge-relayer");
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("TRUE"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("yes"));
    }
}
