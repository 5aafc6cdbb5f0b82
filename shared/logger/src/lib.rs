//! Thread-safe asynchronous logging library built on `tracing`.

pub mod error;
mod log_level;
mod logger;
mod subscriber;

pub use error::{LoggingError, Result};
pub use log_level::LogLevel;
pub use logger::Logger;
