//! Append-only log of one training attempt, rendered verbatim by the UI.

use std::fmt;

use serde::Serialize;
use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};

const TIMESTAMP_FORMAT: &[FormatItem<'static>] = format_description!("[hour]:[minute]:[second]");

/// Severity of a training log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable log line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    timestamp: String,
    level: LogLevel,
    message: String,
}

impl LogEntry {
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:<7} {}",
            self.timestamp,
            self.level.as_str().to_ascii_uppercase(),
            self.message
        )
    }
}

/// Ordered sequence of [`LogEntry`] values. Entries are only ever appended or
/// cleared all at once.
#[derive(Clone, Debug, Default)]
pub struct LogAccumulator {
    entries: Vec<LogEntry>,
}

impl LogAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry; called when a new training attempt starts.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Timestamp `message` with the current wall-clock time and append it.
    pub fn append(&mut self, level: LogLevel, message: impl Into<String>) -> &LogEntry {
        let message = message.into();
        mirror_to_tracing(level, &message);
        self.entries.push(LogEntry {
            timestamp: wall_clock_timestamp(),
            level,
            message,
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn mirror_to_tracing(level: LogLevel, message: &str) {
    match level {
        LogLevel::Info | LogLevel::Success => tracing::info!(entry_level = %level, "{message}"),
        LogLevel::Warning => tracing::warn!("{message}"),
        LogLevel::Error => tracing::error!("{message}"),
    }
}

fn wall_clock_timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| String::from("--:--:--"))
}
