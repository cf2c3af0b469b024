//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration for tract-router
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RouterConfig {
    /// Queue sizing
    #[serde(default)]
    pub router: RoutingConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Queue sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Messages each partition queue holds
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Upper bound accepted for `capacity`
    #[serde(default = "default_max_capacity")]
    pub max_capacity: usize,
}

fn default_capacity() -> usize {
    1024
}

fn default_max_capacity() -> usize {
    1 << 20
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            max_capacity: default_max_capacity(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Days to keep rolled log files
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_retention_days() -> u64 {
    7
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            retention_days: default_retention_days(),
            overrides: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RouterConfig::default();
        assert_eq!(config.router.capacity, 1024);
        assert!(config.router.capacity <= config.router.max_capacity);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.retention_days, 7);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: RouterConfig =
            serde_json::from_str(r#"{"router":{"capacity":8}}"#).unwrap();
        assert_eq!(config.router.capacity, 8);
        assert_eq!(config.router.max_capacity, 1 << 20);
        assert_eq!(config.logging.format, "text");
    }
}
