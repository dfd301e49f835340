//! Logging setup for orders-etl
//!
//! Logs go to the console and to rolling files, either in the directory
//! passed on the command line or in the platform app data directory.
//!
//! ## Usage
//!
//! ```no_run
//! use orders_etl::logging;
//!
//! // Initialize once at startup
//! logging::init(None).expect("Failed to initialize logging");
//!
//! tracing::info!("run started");
//! ```

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

/// Gets the default log directory path based on platform conventions
///
/// Returns:
/// - Windows: `%APPDATA%/orders-etl/logs`
/// - macOS: `~/Library/Application Support/orders-etl/logs`
/// - Linux: `~/.local/share/orders-etl/logs`
pub fn get_log_dir() -> Result<PathBuf> {
    let base_dir = dirs::data_dir().context("Failed to determine data directory")?;
    Ok(base_dir.join("orders-etl").join("logs"))
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
    }
    Ok(())
}

/// Initializes console and file logging
///
/// Creates two daily-rotated files:
/// - `orders-etl.<date>.log`: everything passing the env filter
/// - `error.<date>.log`: warnings and errors only
///
/// `RUST_LOG` overrides the default `info` level.
///
/// # Errors
///
/// Returns error if the log directory cannot be created or file appenders fail
pub fn init(log_dir: Option<&Path>) -> Result<()> {
    let log_dir = match log_dir {
        Some(dir) => dir.to_path_buf(),
        None => get_log_dir()?,
    };
    ensure_dir(&log_dir)?;

    let all_logs_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(10)
        .filename_prefix("orders-etl")
        .filename_suffix("log")
        .build(&log_dir)
        .context("Failed to create all-logs file appender")?;

    let error_logs_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(10)
        .filename_prefix("error")
        .filename_suffix("log")
        .build(&log_dir)
        .context("Failed to create error-logs file appender")?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Failed to create env filter")?;

    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .compact();

    let all_logs_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(all_logs_appender);

    let error_logs_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(error_logs_appender)
        .with_filter(EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(all_logs_layer)
        .with(error_logs_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::debug!("Logging initialized, log directory: {:?}", log_dir);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_log_dir() {
        let log_dir = get_log_dir().expect("Failed to get log dir");
        assert!(log_dir.ends_with("orders-etl/logs") || log_dir.ends_with("orders-etl\\logs"));
    }

    #[test]
    fn test_ensure_dir_creates_nested() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let nested = tmp.path().join("a").join("logs");
        ensure_dir(&nested).expect("create");
        assert!(nested.is_dir());
    }
}
