//! Progress reporting.
//!
//! Every stage reports through a caller-supplied [`Reporter`] instead of
//! printing directly, so frontends choose where lines go and tests can capture
//! them without scraping stdout.

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

/// Severity of a reported line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Info,
    Success,
    Error,
}

impl Level {
    /// Console marker printed in front of a line.
    pub fn marker(&self) -> &'static str {
        match self {
            Level::Info => "[*]",
            Level::Success => "[+]",
            Level::Error => "[!]",
        }
    }
}

/// Sink for human-readable progress lines.
pub trait Reporter {
    fn report(&self, level: Level, message: &str);

    fn info(&self, message: &str) {
        self.report(Level::Info, message);
    }

    fn success(&self, message: &str) {
        self.report(Level::Success, message);
    }

    fn error(&self, message: &str) {
        self.report(Level::Error, message);
    }
}

/// Prints each line to stdout prefixed with its severity marker.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn report(&self, level: Level, message: &str) {
        println!("{} {}", level.marker(), message);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&self, _level: Level, _message: &str) {}
}

/// Keeps every reported line in memory, in order.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    lines: RefCell<Vec<(Level, String)>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far.
    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines.borrow().clone()
    }

    /// Messages reported at `level`, in order.
    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.lines
            .borrow()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Whether any line at `level` contains `needle`.
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.lines.borrow().iter().any(|(l, m)| *l == level && m.contains(needle))
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, level: Level, message: &str) {
        self.lines.borrow_mut().push((level, message.to_string()));
    }
}
