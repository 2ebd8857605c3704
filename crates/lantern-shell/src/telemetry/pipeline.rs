//! The shared, redacting log pipeline.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use lantern_config::{DEFAULT_LOG_LEVEL, LogLevel};

use super::destination::LogDestination;
use super::record::{LogRecord, Severity, SourceLocation, level_from_rank, threshold_rank};
use super::redaction::{RedactionRule, redact};

/// Thread-safe logging pipeline feeding one or more destinations.
///
/// Records below the current level are dropped before any work is done.
/// Accepted records are redacted, formatted and written while holding a
/// single pipeline-wide lock, so lines from concurrent callers never
/// interleave and rotation never sees a half-written line.
pub struct LogPipeline {
    threshold: AtomicU8,
    rules: Vec<RedactionRule>,
    destinations: Mutex<Vec<Box<dyn LogDestination>>>,
    failure_reported: AtomicBool,
    failed_writes: AtomicU64,
}

impl LogPipeline {
    /// Builds an empty pipeline applying `rules` to every record.
    #[must_use]
    pub fn new(rules: Vec<RedactionRule>) -> Self {
        Self {
            threshold: AtomicU8::new(threshold_rank(DEFAULT_LOG_LEVEL)),
            rules,
            destinations: Mutex::new(Vec::new()),
            failure_reported: AtomicBool::new(false),
            failed_writes: AtomicU64::new(0),
        }
    }

    /// Builds a pipeline masking authentication tokens.
    #[must_use]
    pub fn with_token_redaction() -> Self {
        Self::new(RedactionRule::token_rules())
    }

    /// Adds a destination receiving every subsequent record.
    pub fn append(&self, destination: Box<dyn LogDestination>) {
        self.lock_destinations().push(destination);
    }

    /// Changes the threshold for all subsequent calls.
    pub fn set_level(&self, level: LogLevel) {
        self.threshold
            .store(threshold_rank(level), Ordering::Release);
    }

    /// Current threshold.
    #[must_use]
    pub fn level(&self) -> LogLevel {
        level_from_rank(self.threshold.load(Ordering::Acquire))
    }

    /// Returns whether a record of `severity` would be written.
    #[must_use]
    pub fn enabled(&self, severity: Severity) -> bool {
        severity.rank() >= self.threshold.load(Ordering::Acquire)
    }

    /// Logs `text` without a source location.
    pub fn log(&self, severity: Severity, text: &str) {
        self.log_at(severity, text, None);
    }

    /// Logs `text`, attributing it to `location` when known.
    pub fn log_at(&self, severity: Severity, text: &str, location: Option<SourceLocation>) {
        if !self.enabled(severity) {
            return;
        }
        let text = redact(&self.rules, text);
        let line = LogRecord::new(severity, text.into_owned(), location).to_line();

        let mut destinations = self.lock_destinations();
        for destination in destinations.iter_mut() {
            if let Err(error) = destination.write_line(&line) {
                self.write_failed(&**destination, &error);
            }
        }
    }

    /// Flushes every destination.
    pub fn flush(&self) {
        let mut destinations = self.lock_destinations();
        for destination in destinations.iter_mut() {
            if let Err(error) = destination.flush() {
                self.write_failed(&**destination, &error);
            }
        }
    }

    /// Flushes and drops every destination. Later records go nowhere.
    pub fn close(&self) {
        self.flush();
        self.lock_destinations().clear();
    }

    /// Number of writes that failed since the pipeline was built.
    #[must_use]
    pub fn failed_writes(&self) -> u64 {
        self.failed_writes.load(Ordering::Relaxed)
    }

    /// Reports a pipeline problem on the original error stream, once per
    /// pipeline. Used for write failures and for setup problems the pipeline
    /// cannot log about itself.
    pub(crate) fn report_once(&self, message: &str) {
        if self.failure_reported.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut stderr = io::stderr().lock();
        // Nothing further can be done if stderr is gone as well.
        let _ = writeln!(stderr, "lantern: logging degraded: {message}");
    }

    fn write_failed(&self, destination: &dyn LogDestination, error: &io::Error) {
        self.failed_writes.fetch_add(1, Ordering::Relaxed);
        self.report_once(&format!(
            "failed to write to {}: {error}",
            destination.describe()
        ));
    }

    fn lock_destinations(&self) -> MutexGuard<'_, Vec<Box<dyn LogDestination>>> {
        self.destinations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for LogPipeline {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("LogPipeline")
            .field("level", &self.level())
            .field("rules", &self.rules)
            .field("failed_writes", &self.failed_writes())
            .finish_non_exhaustive()
    }
}
