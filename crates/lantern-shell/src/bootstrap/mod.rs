//! Ordered startup, reverse teardown and the fatal fallback path.
//!
//! Startup is a fixed list of [`BootstrapStep`]s. Each completed step moves
//! the [`Sequencer`] one state forward. A step may stop startup early with a
//! success status (another instance is running, an update took over) or fail
//! with a [`BootstrapFailure`], which diverts into the fallback surface.
//! Teardown only ever runs for steps that completed, newest first.

mod launch;
mod sequencer;
mod steps;

use std::fmt;

use thiserror::Error;

pub use launch::{ConfigLoader, StaticConfigLoader, SystemConfigLoader, run};
pub(crate) use launch::{LaunchPlan, ProcessControl, ServiceDeps, run_with};
pub use sequencer::{Sequencer, Startup};
pub use steps::{
    ComponentsStep, CrashCaptureStep, InstanceStep, InterfaceStep, LoggingStep, UpdateStep,
};

use crate::context::ShellContext;

pub(crate) const BOOTSTRAP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bootstrap");

/// Position of the shell in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    /// Nothing has run yet.
    Init,
    /// Fault handlers are in place.
    CrashCaptureInstalled,
    /// This process is the only instance.
    InstanceAcquired,
    /// The logging pipeline is accepting records.
    LoggingReady,
    /// No update needs to be applied first.
    UpdateChecked,
    /// Dependent components are initialised.
    ComponentsInitialized,
    /// The interface is up and the main loop may run.
    Running,
    /// Completed steps are being torn down.
    ShuttingDown,
    /// Shutdown finished.
    Terminated,
    /// Startup stopped with a success status.
    EarlyExit,
    /// Startup failed; the fallback surface takes over.
    FatalFallback,
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "Init",
            Self::CrashCaptureInstalled => "CrashCaptureInstalled",
            Self::InstanceAcquired => "InstanceAcquired",
            Self::LoggingReady => "LoggingReady",
            Self::UpdateChecked => "UpdateChecked",
            Self::ComponentsInitialized => "ComponentsInitialized",
            Self::Running => "Running",
            Self::ShuttingDown => "ShuttingDown",
            Self::Terminated => "Terminated",
            Self::EarlyExit => "EarlyExit",
            Self::FatalFallback => "FatalFallback",
        };
        formatter.write_str(name)
    }
}

/// Area a fatal failure originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Arguments or configuration could not be read.
    Configuration,
    /// Fault handlers could not be installed.
    CrashCapture,
    /// The instance lock or activation channel failed.
    InstanceGuard,
    /// Termination signals could not be routed to the main loop.
    Signals,
    /// A dependent component failed to initialise.
    Component,
    /// The interface could not be built.
    Interface,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuration => "configuration",
            Self::CrashCapture => "crash_capture",
            Self::InstanceGuard => "instance_guard",
            Self::Signals => "signals",
            Self::Component => "component",
            Self::Interface => "interface",
        };
        formatter.write_str(name)
    }
}

/// Unrecoverable startup failure. Displays as its message alone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BootstrapFailure {
    kind: FailureKind,
    message: String,
}

impl BootstrapFailure {
    /// Builds a failure of `kind`.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Originating area.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Text shown on the fallback surface.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Reason startup stopped with a success status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarlyExit {
    /// Another instance accepted the activation request.
    AlreadyRunning,
    /// The updater was launched.
    UpdatePending,
}

impl fmt::Display for EarlyExit {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::AlreadyRunning => "already_running",
            Self::UpdatePending => "update_pending",
        })
    }
}

/// Result of a step that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Move on to the next step.
    Continue,
    /// Stop startup and exit with status 0.
    Exit(EarlyExit),
}

/// One ordered unit of startup work with its teardown.
pub trait BootstrapStep: Send {
    /// Identifier used in logs.
    fn name(&self) -> &'static str;

    /// State reached when the step completes.
    fn target(&self) -> BootstrapState;

    /// Performs the step.
    fn run(&mut self, context: &mut ShellContext) -> Result<StepOutcome, BootstrapFailure>;

    /// Undoes a completed run. Only called after `run` returned
    /// [`StepOutcome::Continue`].
    fn teardown(&mut self, context: &mut ShellContext);
}
