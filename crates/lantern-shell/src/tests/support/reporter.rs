//! Test double for [`LifecycleReporter`] that records structured events for
//! assertions.
//!
//! Events are also forwarded to [`StructuredLifecycleReporter`] so the
//! lifecycle shows up in the log file through the interceptor, exactly as it
//! does in production.

use std::sync::Mutex;

use crate::bootstrap::{BootstrapFailure, BootstrapState, EarlyExit, FailureKind};
use crate::health::{LifecycleReporter, StructuredLifecycleReporter};

/// Lifecycle events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The sequencer changed state.
    Transition {
        from: BootstrapState,
        to: BootstrapState,
    },
    /// A step failed.
    StepFailed {
        step: &'static str,
        kind: FailureKind,
        message: String,
    },
    /// Startup stopped with a success status.
    EarlyExit(EarlyExit),
}

/// Records lifecycle events for assertions.
#[derive(Debug, Default)]
pub struct RecordingLifecycleReporter {
    events: Mutex<Vec<LifecycleEvent>>,
    structured: StructuredLifecycleReporter,
}

impl RecordingLifecycleReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .expect("lifecycle reporter mutex poisoned")
            .clone()
    }

    /// States entered, in order.
    #[must_use]
    pub fn states(&self) -> Vec<BootstrapState> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                LifecycleEvent::Transition { to, .. } => Some(to),
                _ => None,
            })
            .collect()
    }

    /// Whether the sequencer ever entered `state`.
    #[must_use]
    pub fn reached(&self, state: BootstrapState) -> bool {
        self.states().contains(&state)
    }

    fn record(&self, event: LifecycleEvent) {
        self.events
            .lock()
            .expect("lifecycle reporter mutex poisoned")
            .push(event);
    }
}

impl LifecycleReporter for RecordingLifecycleReporter {
    fn transition(&self, from: BootstrapState, to: BootstrapState) {
        self.structured.transition(from, to);
        self.record(LifecycleEvent::Transition { from, to });
    }

    fn step_failed(&self, step: &'static str, failure: &BootstrapFailure) {
        self.structured.step_failed(step, failure);
        self.record(LifecycleEvent::StepFailed {
            step,
            kind: failure.kind(),
            message: failure.message().to_owned(),
        });
    }

    fn early_exit(&self, reason: EarlyExit) {
        self.structured.early_exit(reason);
        self.record(LifecycleEvent::EarlyExit(reason));
    }
}
