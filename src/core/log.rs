//! core::log
//!
//! Per-operation log queue returned to callers.
//!
//! Tolerant operations (serialization, optional member lookup, reference
//! re-application) never abort on drift; they record what went wrong in a
//! [`LogQueue`] owned by the caller. Every entry is mirrored to the `log`
//! facade with target `nodebind` so an installed logger sees it too.
//!
//! # Example
//!
//! ```
//! use nodebind::core::log::{LogCategory, LogLevel, LogQueue};
//!
//! let mut log = LogQueue::new();
//! log.warning(LogCategory::Serialization, "attribute 'foo' not found");
//! assert_eq!(log.len(), 1);
//! assert_eq!(log.entries().next().unwrap().level, LogLevel::Warning);
//! ```

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn facade_level(self) -> ::log::Level {
        match self {
            LogLevel::Info => ::log::Level::Info,
            LogLevel::Warning => ::log::Level::Warn,
            LogLevel::Error => ::log::Level::Error,
        }
    }
}

/// Subsystem that produced a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogCategory {
    Application,
    Serialization,
    References,
    Binding,
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogCategory::Application => "application",
            LogCategory::Serialization => "serialization",
            LogCategory::References => "references",
            LogCategory::Binding => "binding",
        };
        f.write_str(name)
    }
}

/// One entry in a [`LogQueue`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub message: String,
    pub level: LogLevel,
    pub category: LogCategory,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(level: LogLevel, category: LogCategory, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level,
            category,
            timestamp: Utc::now(),
        }
    }
}

/// Ordered queue of log entries.
#[derive(Debug, Clone, Default)]
pub struct LogQueue {
    entries: VecDeque<LogEntry>,
}

impl LogQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and mirror it to the `log` facade.
    pub fn push(&mut self, entry: LogEntry) {
        ::log::log!(
            target: "nodebind",
            entry.level.facade_level(),
            "[{}] {}",
            entry.category,
            entry.message
        );
        self.entries.push_back(entry);
    }

    pub fn info(&mut self, category: LogCategory, message: impl Into<String>) {
        self.push(LogEntry::new(LogLevel::Info, category, message));
    }

    pub fn warning(&mut self, category: LogCategory, message: impl Into<String>) {
        self.push(LogEntry::new(LogLevel::Warning, category, message));
    }

    pub fn error(&mut self, category: LogCategory, message: impl Into<String>) {
        self.push(LogEntry::new(LogLevel::Error, category, message));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn pop_front(&mut self) -> Option<LogEntry> {
        self.entries.pop_front()
    }

    /// Remove and return every entry in order.
    pub fn drain(&mut self) -> Vec<LogEntry> {
        self.entries.drain(..).collect()
    }

    /// Count of entries at or above `level`.
    pub fn count_at_least(&self, level: LogLevel) -> usize {
        self.entries.iter().filter(|e| e.level >= level).count()
    }

    /// Entries of one category.
    pub fn in_category(&self, category: LogCategory) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(move |e| e.category == category)
    }
}
