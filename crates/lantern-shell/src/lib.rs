//! Bootstrap and lifecycle orchestration for the Lantern desktop shell.
//!
//! The shell starts as a fixed sequence of steps driven by the bootstrap
//! [`Sequencer`]:
//!
//! 1. **Crash capture** is installed before anything else can fail.
//! 2. **Instance guard**: the first launch takes the instance lock and opens
//!    the activation channel; later launches forward their intent to it and
//!    exit. Files left behind by a crashed owner are taken over.
//! 3. **Logging**: a rotating, redacting pipeline is opened and every
//!    `tracing` event is routed into it.
//! 4. **Update gate**: a staged update hands over to the updater before any
//!    heavy component exists.
//! 5. **Components** such as the embedded web runtime are initialised.
//! 6. **Interface**: the surface is loaded unless the shell started hidden.
//!
//! Completed steps are torn down in reverse on the way out. A failure at any
//! point diverts into the fatal fallback surface and exits with status 1;
//! forwarding to a running instance and yielding to the updater both exit
//! with status 0.

mod bootstrap;
pub mod cli;
pub mod components;
mod context;
pub mod crash;
pub mod event_loop;
pub mod fallback;
mod health;
pub mod instance;
mod placeholder_shell;
pub mod platform;
pub mod shutdown;
pub mod surface;
pub mod telemetry;
pub mod update;

pub use bootstrap::{
    BootstrapFailure, BootstrapState, BootstrapStep, ComponentsStep, ConfigLoader,
    CrashCaptureStep, EarlyExit, FailureKind, InstanceStep, InterfaceStep, LoggingStep, Sequencer,
    Startup, StaticConfigLoader, StepOutcome, SystemConfigLoader, UpdateStep, run,
};
pub use context::ShellContext;
pub use health::{LifecycleReporter, StructuredLifecycleReporter};
pub use placeholder_shell::HeadlessSurface;

#[cfg(test)]
mod tests;
