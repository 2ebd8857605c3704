//! Log records and their on-disk line format.

use std::fmt;

use lantern_config::LogLevel;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Ordered severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Fine-grained tracing output.
    Trace,
    /// Diagnostic detail.
    Debug,
    /// Lifecycle milestones.
    Info,
    /// Recoverable problems.
    Warn,
    /// Failed operations.
    Error,
    /// Unrecoverable failures.
    Fatal,
}

impl Severity {
    /// Upper-case label written into each line.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }

    pub(crate) const fn rank(self) -> u8 {
        match self {
            Self::Trace => 0,
            Self::Debug => 1,
            Self::Info => 2,
            Self::Warn => 3,
            Self::Error => 4,
            Self::Fatal => 5,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.label())
    }
}

impl From<tracing::Level> for Severity {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Self::Trace,
            tracing::Level::DEBUG => Self::Debug,
            tracing::Level::INFO => Self::Info,
            tracing::Level::WARN => Self::Warn,
            tracing::Level::ERROR => Self::Error,
        }
    }
}

/// Threshold rank for a configured level. `disable` sits above every
/// severity so nothing passes.
pub(crate) const fn threshold_rank(level: LogLevel) -> u8 {
    match level {
        LogLevel::Trace => 0,
        LogLevel::Debug => 1,
        LogLevel::Info => 2,
        LogLevel::Warn => 3,
        LogLevel::Error => 4,
        LogLevel::Fatal => 5,
        LogLevel::Disable => 6,
    }
}

pub(crate) const fn level_from_rank(rank: u8) -> LogLevel {
    match rank {
        0 => LogLevel::Trace,
        1 => LogLevel::Debug,
        2 => LogLevel::Info,
        3 => LogLevel::Warn,
        4 => LogLevel::Error,
        5 => LogLevel::Fatal,
        _ => LogLevel::Disable,
    }
}

/// Source position attached to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    file: &'static str,
    line: u32,
}

impl SourceLocation {
    /// Builds a location from a file and line.
    #[must_use]
    pub const fn new(file: &'static str, line: u32) -> Self {
        Self { file, line }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.file, self.line)
    }
}

/// A single, already redacted, log entry.
#[derive(Debug, Clone)]
pub struct LogRecord {
    timestamp: OffsetDateTime,
    severity: Severity,
    text: String,
    location: Option<SourceLocation>,
}

impl LogRecord {
    pub(crate) fn new(severity: Severity, text: String, location: Option<SourceLocation>) -> Self {
        Self {
            timestamp: OffsetDateTime::now_utc(),
            severity,
            text,
            location,
        }
    }

    /// Severity of the record.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }

    /// Message text after redaction.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Renders `<rfc3339> [<LEVEL>] <file:line: ><text>\n`.
    #[must_use]
    pub fn to_line(&self) -> String {
        let timestamp = self
            .timestamp
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.timestamp.unix_timestamp().to_string());
        match self.location {
            Some(location) => format!(
                "{timestamp} [{}] {location}: {}\n",
                self.severity, self.text
            ),
            None => format!("{timestamp} [{}] {}\n", self.severity, self.text),
        }
    }
}
