//! Thread-safe asynchronous logger implementation.
//!
//! This module provides the main [`Logger`] interface for logging messages
//! to a file without blocking the caller. Lines are formatted by a `tracing`
//! subscriber and handed to a background worker owned by `tracing-appender`.

use crate::error::Result;
use crate::log_level::LogLevel;
use crate::subscriber::build_dispatch;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;

/// Thread-safe, non-blocking logger.
///
/// Cloneable instances share the same subscriber and background worker.
/// Pending lines are flushed once the last clone is dropped.
///
/// # Examples
///
/// ```
/// use logging::{Logger, LogLevel};
///
/// let dir = std::env::temp_dir().join("logging-doc");
/// let logger = Logger::new(dir.join("app.log"), LogLevel::Info).unwrap();
/// logger.info("Application started");
/// logger.error("Connection failed");
/// ```
#[derive(Clone)]
pub struct Logger {
    dispatch: Dispatch,
    _guard: Arc<WorkerGuard>,
    level: LogLevel,
    component: Option<String>,
    log_path: PathBuf,
    console_output: bool,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level)
            .field("component", &self.component)
            .field("log_path", &self.log_path)
            .finish()
    }
}

impl Logger {
    /// Creates a new logger with its own background writer.
    ///
    /// # Arguments
    ///
    /// * `log_path` - Path to log file (created if it doesn't exist)
    /// * `level` - Minimum log level to record
    ///
    /// # Errors
    ///
    /// Returns error if the log file cannot be created or opened.
    pub fn new(log_path: PathBuf, level: LogLevel) -> Result<Self> {
        Self::build(log_path, level, None, false)
    }

    /// Creates a new logger with component/layer identification.
    ///
    /// # Arguments
    ///
    /// * `log_path` - Path to log file (created if it doesn't exist)
    /// * `level` - Minimum log level to record
    /// * `component` - Component or layer name (e.g., "RTP", "RTCP", "Transport")
    /// * `console_output` - Mirror every line to stdout
    ///
    /// # Errors
    ///
    /// Returns error if the log file cannot be created or opened.
    pub fn with_component(
        log_path: PathBuf,
        level: LogLevel,
        component: String,
        console_output: bool,
    ) -> Result<Self> {
        Self::build(log_path, level, Some(component), console_output)
    }

    fn build(
        log_path: PathBuf,
        level: LogLevel,
        component: Option<String>,
        console_output: bool,
    ) -> Result<Self> {
        let (dispatch, guard) = build_dispatch(&log_path, level, console_output)?;
        Ok(Logger {
            dispatch,
            _guard: Arc::new(guard),
            level,
            component,
            log_path,
            console_output,
        })
    }

    /// Creates a logger for a different component sharing the same output.
    ///
    /// # Errors
    ///
    /// Kept fallible so callers do not depend on whether the output is shared.
    ///
    /// # Examples
    ///
    /// ```
    /// use logging::{Logger, LogLevel};
    ///
    /// let dir = std::env::temp_dir().join("logging-doc");
    /// let main_logger = Logger::new(dir.join("app.log"), LogLevel::Info).unwrap();
    /// let nack_logger = main_logger.for_component("NACK").unwrap();
    /// ```
    pub fn for_component(&self, component: &str) -> Result<Self> {
        Ok(Logger {
            component: Some(component.to_string()),
            ..self.clone()
        })
    }

    /// Minimum level this logger records.
    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// Path of the file this logger writes to.
    pub fn log_path(&self) -> &PathBuf {
        &self.log_path
    }

    /// Whether lines are mirrored to stdout.
    pub fn console_output(&self) -> bool {
        self.console_output
    }

    /// Logs a debug message (only if level is Debug or lower).
    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    /// Logs an info message (only if level is Info or lower).
    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    /// Logs a warning message (only if level is Warn or lower).
    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    /// Logs an error message (always recorded).
    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    /// Filters by level and emits through this logger's dispatcher.
    fn log(&self, level: LogLevel, message: &str) {
        if level < self.level {
            return;
        }

        let component = self.component.as_deref().unwrap_or("-");
        tracing::dispatcher::with_default(&self.dispatch, || match level {
            LogLevel::Debug => tracing::debug!(component, "{}", message),
            LogLevel::Info => tracing::info!(component, "{}", message),
            LogLevel::Warn => tracing::warn!(component, "{}", message),
            LogLevel::Error => tracing::error!(component, "{}", message),
        });
    }
}
