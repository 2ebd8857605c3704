//! The bootstrap state machine.

use std::mem;
use std::sync::Arc;

use tracing::debug;

use super::{
    BOOTSTRAP_TARGET, BootstrapFailure, BootstrapState, BootstrapStep, EarlyExit, StepOutcome,
};
use crate::context::ShellContext;
use crate::health::LifecycleReporter;

/// How startup ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Startup {
    /// Every step completed; the main loop may run.
    Ready,
    /// A step stopped startup with a success status.
    Exit(EarlyExit),
    /// A step failed.
    Failed(BootstrapFailure),
}

/// Runs steps strictly in order and tears completed ones down in reverse.
pub struct Sequencer {
    steps: Vec<Box<dyn BootstrapStep>>,
    completed: usize,
    state: BootstrapState,
    reporter: Arc<dyn LifecycleReporter>,
}

impl Sequencer {
    /// Builds a sequencer over `steps`, in execution order.
    #[must_use]
    pub fn new(steps: Vec<Box<dyn BootstrapStep>>, reporter: Arc<dyn LifecycleReporter>) -> Self {
        Self {
            steps,
            completed: 0,
            state: BootstrapState::Init,
            reporter,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> BootstrapState {
        self.state
    }

    /// Names of the steps whose teardown is still pending, in run order.
    #[must_use]
    pub fn completed_steps(&self) -> Vec<&'static str> {
        self.steps
            .iter()
            .take(self.completed)
            .map(|step| step.name())
            .collect()
    }

    /// Runs the remaining steps until one stops or fails.
    pub fn start(&mut self, context: &mut ShellContext) -> Startup {
        while let Some(step) = self.steps.get_mut(self.completed) {
            let name = step.name();
            let target = step.target();
            debug!(target: BOOTSTRAP_TARGET, step = name, "running bootstrap step");
            match step.run(context) {
                Ok(StepOutcome::Continue) => {
                    self.completed += 1;
                    self.transition(target);
                }
                Ok(StepOutcome::Exit(reason)) => {
                    self.reporter.early_exit(reason);
                    self.transition(BootstrapState::EarlyExit);
                    return Startup::Exit(reason);
                }
                Err(failure) => {
                    self.fail_step(name, &failure);
                    return Startup::Failed(failure);
                }
            }
        }
        Startup::Ready
    }

    /// Records a failure raised outside any step, such as an unreadable
    /// configuration.
    pub fn fail(&mut self, failure: &BootstrapFailure) {
        self.fail_step("environment", failure);
    }

    /// Normal shutdown from [`BootstrapState::Running`].
    pub fn shutdown(&mut self, context: &mut ShellContext) {
        self.transition(BootstrapState::ShuttingDown);
        self.unwind(context);
        self.transition(BootstrapState::Terminated);
    }

    /// Tears down every completed step, newest first, leaving the state
    /// unchanged. Safe to call more than once.
    pub fn unwind(&mut self, context: &mut ShellContext) {
        while self.completed > 0 {
            self.completed -= 1;
            if let Some(step) = self.steps.get_mut(self.completed) {
                debug!(
                    target: BOOTSTRAP_TARGET,
                    step = step.name(),
                    "tearing down bootstrap step"
                );
                step.teardown(context);
            }
        }
    }

    fn fail_step(&mut self, step: &'static str, failure: &BootstrapFailure) {
        self.reporter.step_failed(step, failure);
        self.transition(BootstrapState::FatalFallback);
    }

    fn transition(&mut self, to: BootstrapState) {
        let from = mem::replace(&mut self.state, to);
        self.reporter.transition(from, to);
    }
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Sequencer")
            .field("state", &self.state)
            .field("completed", &self.completed_steps())
            .finish_non_exhaustive()
    }
}
