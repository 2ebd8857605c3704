//! Structured reporting of bootstrap lifecycle events.

use std::sync::Arc;

use crate::bootstrap::{BootstrapFailure, BootstrapState, EarlyExit};

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer notified as the bootstrap sequencer moves between states.
pub trait LifecycleReporter: Send + Sync {
    /// Invoked on every state change.
    fn transition(&self, from: BootstrapState, to: BootstrapState);

    /// Invoked when a step fails and bootstrap diverts to the fallback.
    fn step_failed(&self, step: &'static str, failure: &BootstrapFailure);

    /// Invoked when bootstrap stops early with a success status.
    fn early_exit(&self, reason: EarlyExit);
}

impl<T> LifecycleReporter for Arc<T>
where
    T: LifecycleReporter,
{
    fn transition(&self, from: BootstrapState, to: BootstrapState) {
        (**self).transition(from, to);
    }

    fn step_failed(&self, step: &'static str, failure: &BootstrapFailure) {
        (**self).step_failed(step, failure);
    }

    fn early_exit(&self, reason: EarlyExit) {
        (**self).early_exit(reason);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredLifecycleReporter;

impl StructuredLifecycleReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl LifecycleReporter for StructuredLifecycleReporter {
    fn transition(&self, from: BootstrapState, to: BootstrapState) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "transition",
            from = %from,
            to = %to,
            "bootstrap state changed"
        );
    }

    fn step_failed(&self, step: &'static str, failure: &BootstrapFailure) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "step_failed",
            step,
            kind = %failure.kind(),
            error = %failure,
            "bootstrap step failed"
        );
    }

    fn early_exit(&self, reason: EarlyExit) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "early_exit",
            reason = %reason,
            "bootstrap stopped early"
        );
    }
}
