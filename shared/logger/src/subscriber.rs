//! Subscriber construction for file (and optional console) output.
//!
//! Every [`Logger`](crate::Logger) owns its own [`Dispatch`], so nothing here
//! installs a process-wide default subscriber.

use crate::error::{LoggingError, Result};
use crate::log_level::LogLevel;
use chrono::Local;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{Registry, fmt as tfmt};

/// Timestamp layout shared by file and console output.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Local wall-clock timestamps with millisecond precision.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct LocalTimestamp;

impl FormatTime for LocalTimestamp {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "[{}]", Local::now().format(TIMESTAMP_FORMAT))
    }
}

/// Splits `log_path` into the appender's directory and file name.
fn split_log_path(log_path: &Path) -> Result<(PathBuf, String)> {
    let file_name = log_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| LoggingError::InvalidPath(log_path.display().to_string()))?
        .to_string();

    let directory = match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    Ok((directory, file_name))
}

/// Builds a dispatcher writing to `log_path` through a non-blocking worker.
///
/// The returned guard flushes pending lines when dropped.
pub(crate) fn build_dispatch(
    log_path: &Path,
    level: LogLevel,
    console_output: bool,
) -> Result<(Dispatch, WorkerGuard)> {
    let (directory, file_name) = split_log_path(log_path)?;
    std::fs::create_dir_all(&directory)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(&directory)
        .map_err(|e| LoggingError::Logging(e.to_string()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = tfmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .with_timer(LocalTimestamp);

    let console_layer = console_output.then(|| {
        tfmt::layer()
            .with_writer(std::io::stdout)
            .with_target(false)
            .with_timer(LocalTimestamp)
    });

    let subscriber = Registry::default()
        .with(level.to_filter())
        .with(file_layer)
        .with(console_layer);

    Ok((Dispatch::new(subscriber), guard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_split_log_path_with_directory() {
        let (dir, name) = split_log_path(Path::new("/var/log/relay.log")).unwrap();
        assert_eq!(dir, PathBuf::from("/var/log"));
        assert_eq!(name, "relay.log");
    }

    #[test]
    fn test_split_log_path_bare_file() {
        let (dir, name) = split_log_path(Path::new("relay.log")).unwrap();
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(name, "relay.log");
    }

    #[test]
    fn test_split_log_path_rejects_root() {
        assert!(split_log_path(Path::new("/")).is_err());
    }

    #[test]
    fn test_build_dispatch_creates_directories() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("nested").join("engine.log");

        let result = build_dispatch(&log_path, LogLevel::Info, false);
        assert!(result.is_ok());
        assert!(dir.path().join("nested").is_dir());
    }

    #[test]
    fn test_timestamp_format() {
        let ts = Local::now().format(TIMESTAMP_FORMAT).to_string();

        // Should match YYYY-MM-DD HH:MM:SS.mmm format
        assert_eq!(ts.len(), 23);
        assert!(ts.contains('-'));
        assert!(ts.contains(':'));
        assert!(ts.contains('.'));
    }
}
