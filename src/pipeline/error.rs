//! Error types and reporting for background producers.

use std::fmt;
use tracing::{error, warn};

/// Errors that can occur while producing an item.
#[derive(Debug, Clone, PartialEq)]
pub enum StationError {
    /// The item is dropped and the producer continues with the next one.
    Recoverable(String),
    /// The producer shuts down.
    Fatal(String),
}

impl fmt::Display for StationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StationError::Recoverable(msg) => write!(f, "Recoverable error: {}", msg),
            StationError::Fatal(msg) => write!(f, "Fatal error: {}", msg),
        }
    }
}

impl std::error::Error for StationError {}

/// Trait for reporting producer errors.
pub trait ErrorReporter: Send + Sync {
    /// Reports an error from a named producer.
    fn report(&self, station: &str, error: &StationError);
}

/// Reporter that forwards to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, station: &str, err: &StationError) {
        match err {
            StationError::Recoverable(msg) => warn!(station, "{}", msg),
            StationError::Fatal(msg) => error!(station, "{}", msg),
        }
    }
}
