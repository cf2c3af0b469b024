//! Configuration loading and management

use super::schema::RouterConfig;
use super::validate::validate_config;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Environment prefix for path overrides, e.g. `TRACT_ROUTER__ROUTER__CAPACITY`
pub const ENV_PREFIX: &str = "TRACT_ROUTER__";

const CONFIG_FILE: &str = "config.json";

/// Configuration loader
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// Create a new config loader with the default config directory
    pub fn new() -> Self {
        let config_dir = dirs::home_dir()
            .map(|h| h.join(".tract-router"))
            .unwrap_or_else(|| PathBuf::from(".tract-router"));

        Self { config_dir }
    }

    /// Create a new config loader with a custom config directory
    pub fn with_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            config_dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Load configuration: defaults, then `config.json`, then environment
    pub fn load(&self) -> crate::Result<RouterConfig> {
        let config_path = self.config_dir.join(CONFIG_FILE);
        let mut merged = serde_json::to_value(RouterConfig::default())?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let file_value: Value = serde_json::from_str(&content)?;
            merge_values(&mut merged, file_value);
        }

        apply_path_overrides(&mut merged, std::env::vars());

        let config: RouterConfig = serde_json::from_value(merged)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &RouterConfig) -> crate::Result<()> {
        validate_config(config)?;
        std::fs::create_dir_all(&self.config_dir)?;
        let config_path = self.config_dir.join(CONFIG_FILE);
        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                if let Some(existing) = base_map.get_mut(&key) {
                    merge_values(existing, value);
                } else {
                    base_map.insert(key, value);
                }
            }
        }
        (base_value, overlay_value) => {
            *base_value = overlay_value;
        }
    }
}

fn parse_env_value(raw: &str) -> Value {
    if let Ok(v) = serde_json::from_str::<Value>(raw) {
        return v;
    }
    if raw.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(v) = raw.parse::<i64>() {
        return Value::Number(v.into());
    }
    Value::String(raw.to_string())
}

fn set_path_value(root: &mut Value, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return;
    };

    let mut current = root;
    for segment in parents {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        current = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Some(map) = current.as_object_mut() {
        map.insert(last.clone(), value);
    }
}

fn apply_path_overrides(config: &mut Value, vars: impl IntoIterator<Item = (String, String)>) {
    for (key, value) in vars {
        let Some(suffix) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let segments: Vec<String> = suffix
            .split("__")
            .filter(|s| !s.is_empty())
            .map(|s| s.to_ascii_lowercase())
            .collect();
        if segments.is_empty() {
            continue;
        }
        set_path_value(config, &segments, parse_env_value(&value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::sync::{Mutex, MutexGuard};
    use tempfile::TempDir;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    struct EnvVarGuard {
        key: String,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &str, value: &str) -> Self {
            let original = std::env::var(key).ok();
            // SAFETY: tests serialize env mutations with ENV_LOCK.
            unsafe { std::env::set_var(key, value) };
            Self {
                key: key.to_string(),
                original,
            }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            if let Some(value) = &self.original {
                // SAFETY: tests serialize env mutations with ENV_LOCK.
                unsafe { std::env::set_var(&self.key, value) };
            } else {
                // SAFETY: tests serialize env mutations with ENV_LOCK.
                unsafe { std::env::remove_var(&self.key) };
            }
        }
    }

    fn lock_env() -> MutexGuard<'static, ()> {
        ENV_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[test]
    fn test_load_default_config() {
        let _lock = lock_env();
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        let config = loader.load().unwrap();

        assert_eq!(config.router.capacity, 1024);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_save_and_load_config() {
        let _lock = lock_env();
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path().join("nested"));

        let mut config = RouterConfig::default();
        config.router.capacity = 64;
        config.logging.format = "json".to_string();

        loader.save(&config).unwrap();
        let loaded = loader.load().unwrap();

        assert_eq!(loaded.router.capacity, 64);
        assert_eq!(loaded.logging.format, "json");
    }

    #[test]
    fn test_file_values_merge_over_defaults() {
        let _lock = lock_env();
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("config.json"),
            r#"{"router":{"capacity":32},"logging":{"overrides":{"tract_router_core":"debug"}}}"#,
        )
        .unwrap();

        let config = ConfigLoader::with_dir(temp_dir.path()).load().unwrap();
        assert_eq!(config.router.capacity, 32);
        assert_eq!(config.router.max_capacity, 1 << 20);
        assert_eq!(
            config.logging.overrides.get("tract_router_core").map(String::as_str),
            Some("debug")
        );
    }

    #[test]
    fn test_load_applies_path_env_overrides() {
        let _lock = lock_env();
        let _cap_guard = EnvVarGuard::set("TRACT_ROUTER__ROUTER__CAPACITY", "256");
        let _level_guard = EnvVarGuard::set("TRACT_ROUTER__LOGGING__LEVEL", "debug");

        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("config.json"),
            r#"{"router":{"capacity":16}}"#,
        )
        .unwrap();

        let config = ConfigLoader::with_dir(temp_dir.path()).load().unwrap();
        assert_eq!(config.router.capacity, 256);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validation_rejects_zero_capacity_from_env() {
        let _lock = lock_env();
        let _cap_guard = EnvVarGuard::set("TRACT_ROUTER__ROUTER__CAPACITY", "0");

        let temp_dir = TempDir::new().unwrap();
        let err = ConfigLoader::with_dir(temp_dir.path()).load().unwrap_err();
        assert!(err.to_string().contains("router.capacity"));
    }

    #[test]
    fn test_apply_path_overrides_ignores_foreign_keys() {
        let mut value = serde_json::json!({"router": {"capacity": 1}});
        apply_path_overrides(
            &mut value,
            vec![
                ("OTHER__ROUTER__CAPACITY".to_string(), "9".to_string()),
                ("TRACT_ROUTER__".to_string(), "9".to_string()),
                ("TRACT_ROUTER__ROUTER__MAX_CAPACITY".to_string(), "9".to_string()),
            ],
        );
        assert_eq!(value["router"]["capacity"], 1);
        assert_eq!(value["router"]["max_capacity"], 9);
    }

    #[test]
    fn test_parse_env_value() {
        assert_eq!(parse_env_value("42"), Value::from(42));
        assert_eq!(parse_env_value("TRUE"), Value::Bool(true));
        assert_eq!(parse_env_value("json"), Value::String("json".to_string()));
    }
}
