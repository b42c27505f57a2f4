use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of a detected log line, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of a fetched log window. `number` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogLine<'a> {
    pub number: usize,
    pub text: &'a str,
}

impl<'a> LogLine<'a> {
    /// Split a log window into numbered lines.
    pub fn split(text: &'a str) -> impl Iterator<Item = LogLine<'a>> {
        text.split('\n').enumerate().map(|(index, line)| LogLine {
            number: index + 1,
            text: line,
        })
    }
}

/// A log line that matched an error signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub line: usize,
    pub content: String,
    pub timestamp: Option<String>,
    pub severity: Severity,
}
