//! Test helpers for the telemetry module.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use super::LogDestination;

/// Destination collecting lines in memory, optionally failing every write.
#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryDestination {
    lines: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl MemoryDestination {
    pub(crate) fn failing() -> Self {
        Self {
            lines: Arc::default(),
            fail: true,
        }
    }

    pub(crate) fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LogDestination for MemoryDestination {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::StorageFull, "disk full"));
        }
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_owned());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_owned()
    }
}
