//! Configuration validation rules.

use super::schema::RouterConfig;
use crate::router::MAX_CAPACITY;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 2] = ["text", "json"];

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &RouterConfig) -> crate::Result<()> {
    let mut errors = Vec::new();

    if config.router.capacity == 0 {
        errors.push("router.capacity must be > 0".to_string());
    }
    if config.router.max_capacity == 0 || config.router.max_capacity > MAX_CAPACITY {
        errors.push(format!(
            "router.max_capacity must be in [1, {}]",
            MAX_CAPACITY
        ));
    }
    if config.router.capacity > config.router.max_capacity {
        errors.push(format!(
            "router.capacity ({}) must not exceed router.max_capacity ({})",
            config.router.capacity, config.router.max_capacity
        ));
    }

    if !LOG_LEVELS.contains(&config.logging.level.to_ascii_lowercase().as_str()) {
        errors.push(format!(
            "logging.level must be one of {}",
            LOG_LEVELS.join(", ")
        ));
    }
    if !LOG_FORMATS.contains(&config.logging.format.to_ascii_lowercase().as_str()) {
        errors.push("logging.format must be text or json".to_string());
    }
    if config.logging.dir.trim().is_empty() {
        errors.push("logging.dir must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_defaults() {
        validate_config(&RouterConfig::default()).unwrap();
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = RouterConfig::default();
        config.router.capacity = 0;

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("router.capacity must be > 0"));
    }

    #[test]
    fn test_validate_aggregates_errors() {
        let mut config = RouterConfig::default();
        config.router.capacity = 10;
        config.router.max_capacity = 5;
        config.logging.format = "xml".to_string();
        config.logging.dir = "  ".to_string();

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("must not exceed router.max_capacity"));
        assert!(err.contains("logging.format"));
        assert!(err.contains("logging.dir"));
    }

    #[test]
    fn test_validate_rejects_unknown_level() {
        let mut config = RouterConfig::default();
        config.logging.level = "verbose".to_string();

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("logging.level"));
    }
}
