//! Tracing setup shared by the CLI and the boundary adapter

use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::config::schema::LoggingConfig;
use crate::error::{Error, Result};

const SECS_PER_DAY: u64 = 24 * 3600;

/// Rolling log file prefix; the appender adds `.YYYY-MM-DD`
pub const LOG_FILE_PREFIX: &str = "router.log";

/// Build the level filter: `RUST_LOG` wins, then config level and overrides
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    for (module, level) in &config.overrides {
        match format!("{}={}", module, level).parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(_) => eprintln!("Invalid log directive: {}={}", module, level),
        }
    }
    filter
}

/// Whether output should be JSON. `LOG_FORMAT` overrides config.
pub fn use_json(config: &LoggingConfig) -> bool {
    std::env::var("LOG_FORMAT")
        .unwrap_or_else(|_| config.format.clone())
        .eq_ignore_ascii_case("json")
}

/// Initialize the logging system: stdout plus a daily rolling file.
///
/// Keep the returned guard alive for the life of the process, dropping it
/// flushes the file writer. Fails without installing anything when the log
/// directory cannot be created.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .build(&config.dir)
        .map_err(|e| Error::Config(format!("log directory {}: {}", config.dir, e)))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = build_filter(config);
    let is_json = use_json(config);

    let stdout_layer = if is_json {
        fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer().with_target(true).with_thread_ids(true).boxed()
    };

    let file_layer = if is_json {
        fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_target(true)
            .with_thread_ids(true)
            .with_ansi(false)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    };

    // A subscriber may already be installed by an embedding host.
    if Registry::default()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .is_err()
    {
        eprintln!("Global tracing subscriber already set; keeping existing one");
    }

    if let Err(e) = cleanup_old_logs(&config.dir, config.retention_days) {
        eprintln!("Failed to clean up old logs: {}", e);
    }

    Ok(guard)
}

/// Remove rolled router logs older than `days` days. Returns how many
/// files were removed.
pub fn cleanup_old_logs<P: AsRef<Path>>(dir: P, days: u64) -> std::io::Result<usize> {
    let path = dir.as_ref();
    if !path.exists() {
        return Ok(0);
    }

    let now = SystemTime::now();
    let threshold = Duration::from_secs(days.saturating_mul(SECS_PER_DAY));
    let mut removed = 0;

    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let is_router_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX));
        if !is_router_log {
            continue;
        }

        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        if age.is_some_and(|age| age > threshold) {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => eprintln!("Failed to remove old log file {:?}: {}", path, e),
            }
        }
    }
    Ok(removed)
}
