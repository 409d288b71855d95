//! Logging sink with per-call verbosity.
//!
//! The pipeline never touches global logger configuration. Each call builds
//! a [`CallLogger`] from the sink and the context's optional level override;
//! the override acts as that call's threshold and nothing else sees it.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use domolib_core::LogLevel;

// ============================================================================
// Log Record
// ============================================================================

/// A single structured log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Severity.
    pub level: LogLevel,
    /// Human-readable message.
    pub message: String,
    /// Structured key/value fields.
    pub fields: Vec<(&'static str, String)>,
}

impl LogRecord {
    /// Returns the value of a field, if present.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

// ============================================================================
// Log Sink
// ============================================================================

/// Destination for pipeline log records.
pub trait LogSink: Send + Sync + fmt::Debug {
    /// Writes a record. Filtering has already happened.
    fn emit(&self, record: &LogRecord);

    /// Threshold used when a call carries no override.
    fn default_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

/// Forwards records to `tracing` events under the `domolib` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink {
    default_level: LogLevel,
}

impl TracingSink {
    /// Creates a sink with the given ambient threshold.
    pub fn new(default_level: LogLevel) -> Self {
        Self { default_level }
    }
}

impl LogSink for TracingSink {
    fn emit(&self, record: &LogRecord) {
        let fields = format_fields(&record.fields);
        let message = record.message.as_str();
        match record.level {
            LogLevel::Trace => tracing::trace!(target: "domolib", fields = %fields, "{message}"),
            LogLevel::Debug => tracing::debug!(target: "domolib", fields = %fields, "{message}"),
            LogLevel::Info => tracing::info!(target: "domolib", fields = %fields, "{message}"),
            LogLevel::Warn => tracing::warn!(target: "domolib", fields = %fields, "{message}"),
            LogLevel::Error => tracing::error!(target: "domolib", fields = %fields, "{message}"),
        }
    }

    fn default_level(&self) -> LogLevel {
        self.default_level
    }
}

/// Keeps records in memory. Useful in tests of code built on the pipeline.
#[derive(Debug, Default)]
pub struct MemorySink {
    default_level: LogLevel,
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    /// Creates an empty sink with the given ambient threshold.
    pub fn new(default_level: LogLevel) -> Self {
        Self {
            default_level,
            records: Mutex::new(Vec::new()),
        }
    }

    /// Returns a copy of everything recorded so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LogSink for MemorySink {
    fn emit(&self, record: &LogRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
    }

    fn default_level(&self) -> LogLevel {
        self.default_level
    }
}

// ============================================================================
// Call Logger
// ============================================================================

/// Sink view scoped to one call.
#[derive(Debug, Clone, Copy)]
pub struct CallLogger<'a> {
    sink: &'a dyn LogSink,
    threshold: LogLevel,
}

impl<'a> CallLogger<'a> {
    /// Uses `level_override` when set, otherwise the sink's default.
    pub fn new(sink: &'a dyn LogSink, level_override: Option<LogLevel>) -> Self {
        Self {
            sink,
            threshold: level_override.unwrap_or_else(|| sink.default_level()),
        }
    }

    /// Returns the active threshold.
    pub fn threshold(&self) -> LogLevel {
        self.threshold
    }

    /// Returns true if a record at `level` would be emitted.
    pub fn enabled(&self, level: LogLevel) -> bool {
        self.threshold.allows(level)
    }

    /// Emits a record if it passes the threshold.
    pub fn log(&self, level: LogLevel, message: impl Into<String>, fields: Vec<(&'static str, String)>) {
        if !self.enabled(level) {
            return;
        }
        self.sink.emit(&LogRecord {
            level,
            message: message.into(),
            fields,
        });
    }
}

fn format_fields(fields: &[(&'static str, String)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_replaces_default_threshold() {
        let sink = MemorySink::new(LogLevel::Warn);

        let quiet = CallLogger::new(&sink, None);
        quiet.log(LogLevel::Debug, "dropped", vec![]);

        let loud = CallLogger::new(&sink, Some(LogLevel::Debug));
        loud.log(LogLevel::Debug, "kept", vec![("url", "u".to_string())]);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "kept");
        assert_eq!(records[0].field("url"), Some("u"));
    }

    #[test]
    fn test_override_can_silence() {
        let sink = MemorySink::new(LogLevel::Trace);
        let logger = CallLogger::new(&sink, Some(LogLevel::Error));
        logger.log(LogLevel::Warn, "dropped", vec![]);
        assert!(sink.records().is_empty());
        assert_eq!(logger.threshold(), LogLevel::Error);
    }

    #[test]
    fn test_format_fields() {
        let fields = vec![("a", "1".to_string()), ("b", "two".to_string())];
        assert_eq!(format_fields(&fields), "a=1 b=two");
    }
}
