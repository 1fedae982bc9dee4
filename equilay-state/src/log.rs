//! Capped activity log shown to the operator.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Entries kept; older ones fall off the end.
pub const MAX_LOG_ENTRIES: usize = 50;

/// Severity of an activity-log entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Success => write!(f, "success"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One activity-log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub time: DateTime<Utc>,
    pub text: String,
    pub level: LogLevel,
}

impl LogEntry {
    /// Create an entry stamped with the current time.
    pub fn new(text: impl Into<String>, level: LogLevel) -> Self {
        Self { time: Utc::now(), text: text.into(), level }
    }

    /// Local wall-clock time as `HH:MM:SS`.
    pub fn local_time(&self) -> String {
        self.time.with_timezone(&Local).format("%H:%M:%S").to_string()
    }
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] {}", self.local_time(), self.level, self.text)
    }
}

/// Newest-first ring of entries.
#[derive(Debug, Clone, Default)]
pub(crate) struct ActivityLog {
    entries: VecDeque<LogEntry>,
}

impl ActivityLog {
    pub(crate) fn push(&mut self, entry: LogEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(MAX_LOG_ENTRIES);
    }

    pub(crate) fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_first_and_capped() {
        let mut log = ActivityLog::default();
        for i in 0..60 {
            log.push(LogEntry::new(format!("entry {i}"), LogLevel::Info));
        }
        let entries = log.to_vec();
        assert_eq!(entries.len(), MAX_LOG_ENTRIES);
        assert_eq!(entries[0].text, "entry 59");
        assert_eq!(entries[49].text, "entry 10");
    }

    #[test]
    fn test_level_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&LogLevel::Warning).unwrap(), "\"warning\"");
        assert_eq!(LogLevel::Success.to_string(), "success");
    }
}
