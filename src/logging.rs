//! Logging Setup
//!
//! Console logging by default; `--debug` additionally writes daily-rotated
//! log files under `{data_dir}/logs` via a non-blocking appender.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Logging configuration assembled before tracing is initialized.
#[derive(Debug, Clone)]
pub struct LogConfig {
    debug_mode: bool,
    log_dir: PathBuf,
    level: Option<String>,
}

impl LogConfig {
    pub fn new() -> Self {
        Self {
            debug_mode: false,
            log_dir: crate::config::wacrab_home().join("logs"),
            level: None,
        }
    }

    pub fn with_debug_mode(mut self, debug: bool) -> Self {
        self.debug_mode = debug;
        self
    }

    pub fn with_log_dir(mut self, dir: PathBuf) -> Self {
        self.log_dir = dir;
        self
    }

    /// Base level from the config file; `--debug` and `RUST_LOG` win over it.
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialize the global tracing subscriber.
///
/// Returns the appender guard when file logging is active; the caller must
/// keep it alive for the process lifetime or buffered lines are lost.
pub fn init_logging(config: LogConfig) -> Result<Option<WorkerGuard>> {
    let default_directives = if config.debug_mode {
        "wacrab=debug,tower_http=debug".to_string()
    } else {
        format!("wacrab={}", config.level.as_deref().unwrap_or("info"))
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    if config.debug_mode {
        std::fs::create_dir_all(&config.log_dir)
            .with_context(|| format!("Failed to create log directory: {:?}", config.log_dir))?;

        let appender = tracing_appender::rolling::daily(&config.log_dir, "wacrab.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false),
            )
            .init();

        Ok(Some(guard))
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();

        Ok(None)
    }
}

/// Remove log files older than `max_age_days` from the default log directory.
/// Returns the number of files removed.
pub fn cleanup_old_logs(max_age_days: u64) -> Result<usize> {
    let log_dir = crate::config::wacrab_home().join("logs");
    if !log_dir.exists() {
        return Ok(0);
    }

    let cutoff = Duration::from_secs(max_age_days * 24 * 60 * 60);
    let now = SystemTime::now();
    let mut removed = 0;

    for entry in std::fs::read_dir(&log_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let modified = match entry.metadata().and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(_) => continue,
        };
        if let Ok(age) = now.duration_since(modified)
            && age > cutoff
            && std::fs::remove_file(&path).is_ok()
        {
            removed += 1;
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_builder() {
        let config = LogConfig::new()
            .with_debug_mode(true)
            .with_level("warn")
            .with_log_dir(PathBuf::from("/tmp/wacrab-test-logs"));
        assert!(config.debug_mode);
        assert_eq!(config.level.as_deref(), Some("warn"));
        assert_eq!(config.log_dir, PathBuf::from("/tmp/wacrab-test-logs"));
    }

    #[test]
    fn test_cleanup_missing_dir_is_noop() {
        // Default dir may not exist in CI; cleanup must not error.
        let removed = cleanup_old_logs(7).expect("cleanup should tolerate a missing dir");
        // Nothing to assert on count — only that it didn't fail.
        let _ = removed;
    }
}
