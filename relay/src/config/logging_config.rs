use serde::Deserialize;

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_file_path: String,
    pub log_level: String,
    pub enable_console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_file_path: "relay.log".to_string(),
            log_level: "info".to_string(),
            enable_console: true,
        }
    }
}

impl LoggingConfig {
    /// Parsed level, falling back to info for unknown names
    pub fn level(&self) -> logging::LogLevel {
        self.log_level.parse().unwrap_or(logging::LogLevel::Info)
    }
}
