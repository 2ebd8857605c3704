//! The shell's bootstrap steps, in execution order.

use std::mem;
use std::sync::Arc;

use lantern_config::{APP_NAME, RuntimePaths, Setting};
use tracing::{info, warn};

use super::{
    BOOTSTRAP_TARGET, BootstrapFailure, BootstrapState, BootstrapStep, EarlyExit, FailureKind,
    StepOutcome,
};
use crate::components::{ComponentFactory, ComponentRegistry};
use crate::context::ShellContext;
use crate::crash::FaultHandler;
use crate::instance::{
    Acquisition, ActivationListener, ActivationListenerHandle, ActivationRequest, InstanceError,
    InstanceGuard, InstanceLock,
};
use crate::shutdown::SignalForwarding;
use crate::telemetry::{self, InterceptorHandle, InterceptorScope, Severity, install_interceptor};
use crate::update::{StagedUpdateSource, UpdateDecision, UpdateGate, UpdaterLauncher};

const BUILD_DATE: &str = env!("LANTERN_BUILD_DATE");
const BUILD_TARGET: &str = env!("LANTERN_BUILD_TARGET");

/// Installs crash capture before anything else can fail.
pub struct CrashCaptureStep {
    faults: Box<dyn FaultHandler>,
}

impl CrashCaptureStep {
    /// Builds the step around `faults`.
    #[must_use]
    pub fn new(faults: Box<dyn FaultHandler>) -> Self {
        Self { faults }
    }
}

impl BootstrapStep for CrashCaptureStep {
    fn name(&self) -> &'static str {
        "crash_capture"
    }

    fn target(&self) -> BootstrapState {
        BootstrapState::CrashCaptureInstalled
    }

    fn run(&mut self, context: &mut ShellContext) -> Result<StepOutcome, BootstrapFailure> {
        let crash_dir = context.config().crash_dir();
        self.faults
            .install(crash_dir.as_std_path())
            .map_err(|error| BootstrapFailure::new(FailureKind::CrashCapture, error.to_string()))?;
        Ok(StepOutcome::Continue)
    }

    fn teardown(&mut self, _context: &mut ShellContext) {
        self.faults.uninstall();
    }
}

/// Takes the instance lock, or forwards this launch to the running instance.
///
/// The primary also starts the activation listener and signal forwarding,
/// both of which feed the main loop.
pub struct InstanceStep {
    signals: Box<dyn SignalForwarding>,
    lock: Option<InstanceLock>,
    listener: Option<ActivationListenerHandle>,
}

impl InstanceStep {
    /// Builds the step around the signal forwarder the primary starts.
    #[must_use]
    pub fn new(signals: Box<dyn SignalForwarding>) -> Self {
        Self {
            signals,
            lock: None,
            listener: None,
        }
    }
}

fn instance_failure(error: impl Into<InstanceError>) -> BootstrapFailure {
    BootstrapFailure::new(FailureKind::InstanceGuard, error.into().to_string())
}

impl BootstrapStep for InstanceStep {
    fn name(&self) -> &'static str {
        "instance_guard"
    }

    fn target(&self) -> BootstrapState {
        BootstrapState::InstanceAcquired
    }

    fn run(&mut self, context: &mut ShellContext) -> Result<StepOutcome, BootstrapFailure> {
        let paths = RuntimePaths::from_config(context.config()).map_err(instance_failure)?;
        let guard = InstanceGuard::new(paths, context.config().activation_timeout());
        let request = ActivationRequest::for_current_process(
            &context.options().raw_arguments,
            !context.options().start_hidden,
        );
        let lock = match guard.ensure_unique(&request).map_err(instance_failure)? {
            Acquisition::Secondary => return Ok(StepOutcome::Exit(EarlyExit::AlreadyRunning)),
            Acquisition::Primary(lock) => lock,
        };

        let listener = ActivationListener::bind(guard.paths().socket_path())
            .and_then(|listener| listener.start(Arc::new(context.events().clone())))
            .map_err(instance_failure)?;
        self.signals
            .start(context.events().clone())
            .map_err(|error| BootstrapFailure::new(FailureKind::Signals, error.to_string()))?;

        self.lock = Some(lock);
        self.listener = Some(listener);
        Ok(StepOutcome::Continue)
    }

    fn teardown(&mut self, _context: &mut ShellContext) {
        self.signals.stop();
        if let Some(listener) = self.listener.take() {
            listener.shutdown();
            if let Err(error) = listener.join() {
                warn!(
                    target: BOOTSTRAP_TARGET,
                    error = %error,
                    "activation listener did not stop cleanly"
                );
            }
        }
        self.lock = None;
    }
}

/// Starts the logging pipeline and routes `tracing` into it.
///
/// Logging problems never stop the shell, so this step cannot fail.
pub struct LoggingStep {
    scope: InterceptorScope,
    interceptor: Option<InterceptorHandle>,
}

impl LoggingStep {
    /// Builds the step installing the interceptor with `scope`.
    #[must_use]
    pub fn new(scope: InterceptorScope) -> Self {
        Self {
            scope,
            interceptor: None,
        }
    }
}

impl BootstrapStep for LoggingStep {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn target(&self) -> BootstrapState {
        BootstrapState::LoggingReady
    }

    fn run(&mut self, context: &mut ShellContext) -> Result<StepOutcome, BootstrapFailure> {
        let pipeline = telemetry::open_pipeline(context.config());
        pipeline.log(
            Severity::Debug,
            &format!(
                "Logging to {}",
                context.config().log_dir().join(telemetry::log_file_name())
            ),
        );
        match install_interceptor(&pipeline, self.scope) {
            Ok(handle) => {
                if handle.already_installed() {
                    pipeline.log(
                        Severity::Warn,
                        "Log interceptor already installed; tracing events keep flowing to the \
                         first pipeline",
                    );
                }
                self.interceptor = Some(handle);
            }
            Err(error) => pipeline.log(Severity::Warn, &error.to_string()),
        }

        pipeline.log(
            Severity::Info,
            &format!(
                "Starting {APP_NAME} version: {} build date: {BUILD_DATE}",
                env!("CARGO_PKG_VERSION")
            ),
        );
        pipeline.log(
            Severity::Info,
            &format!(
                "  Running on: {} [{}] arch {}",
                std::env::consts::OS,
                context.platform().name(),
                std::env::consts::ARCH
            ),
        );
        pipeline.log(Severity::Info, &format!("  Build target: {BUILD_TARGET}"));
        for warning in context.take_deferred_warnings() {
            pipeline.log(Severity::Warn, &warning);
        }

        context.set_pipeline(pipeline);
        Ok(StepOutcome::Continue)
    }

    fn teardown(&mut self, context: &mut ShellContext) {
        self.interceptor = None;
        if let Some(pipeline) = context.take_pipeline() {
            pipeline.close();
        }
    }
}

/// Yields to a staged update before any heavy component exists.
pub struct UpdateStep {
    launcher: Option<Box<dyn UpdaterLauncher>>,
}

impl UpdateStep {
    /// Builds the step around the updater `launcher`.
    #[must_use]
    pub fn new(launcher: Box<dyn UpdaterLauncher>) -> Self {
        Self {
            launcher: Some(launcher),
        }
    }
}

impl BootstrapStep for UpdateStep {
    fn name(&self) -> &'static str {
        "update_gate"
    }

    fn target(&self) -> BootstrapState {
        BootstrapState::UpdateChecked
    }

    fn run(&mut self, context: &mut ShellContext) -> Result<StepOutcome, BootstrapFailure> {
        let decision = match self.launcher.take() {
            Some(launcher) if !context.config().skip_update_check => UpdateGate::new(
                Box::new(StagedUpdateSource::new(context.config().update_dir())),
                launcher,
                env!("CARGO_PKG_VERSION"),
            )
            .check_for_updates(),
            _ => {
                info!(target: BOOTSTRAP_TARGET, "update check skipped");
                UpdateDecision::NoneAvailable
            }
        };
        context.set_update_decision(decision);
        match decision {
            UpdateDecision::AvailablePendingExit => Ok(StepOutcome::Exit(EarlyExit::UpdatePending)),
            UpdateDecision::NoneAvailable => Ok(StepOutcome::Continue),
        }
    }

    fn teardown(&mut self, _context: &mut ShellContext) {}
}

/// Initialises dependent components, then applies the configured log level.
pub struct ComponentsStep {
    factories: Vec<ComponentFactory>,
    registry: ComponentRegistry,
}

impl ComponentsStep {
    /// Builds the step over `factories`, initialised in order.
    #[must_use]
    pub fn new(factories: Vec<ComponentFactory>) -> Self {
        Self {
            factories,
            registry: ComponentRegistry::new(),
        }
    }
}

impl BootstrapStep for ComponentsStep {
    fn name(&self) -> &'static str {
        "components"
    }

    fn target(&self) -> BootstrapState {
        BootstrapState::ComponentsInitialized
    }

    fn run(&mut self, context: &mut ShellContext) -> Result<StepOutcome, BootstrapFailure> {
        context.platform().restore_numeric_locale();
        let factories = mem::take(&mut self.factories);
        self.registry
            .initialize_all(factories, &context.component_context())
            .map_err(|error| BootstrapFailure::new(FailureKind::Component, error.to_string()))?;
        apply_log_level(context);
        Ok(StepOutcome::Continue)
    }

    fn teardown(&mut self, _context: &mut ShellContext) {
        self.registry.shutdown_all();
    }
}

fn apply_log_level(context: &ShellContext) {
    let Some(pipeline) = context.pipeline() else {
        return;
    };
    match context.config().log_level() {
        Setting::Configured(level) => {
            pipeline.log(Severity::Info, &format!("Setting log level to: {level}"));
            pipeline.set_level(level);
        }
        Setting::Invalid { raw, fallback } => {
            pipeline.log(
                Severity::Warn,
                &format!("Invalid log level '{raw}'; using {fallback}"),
            );
            pipeline.set_level(fallback);
        }
        Setting::Default(_) => {}
    }
}

/// Builds the interface unless the shell was started hidden.
#[derive(Debug, Default)]
pub struct InterfaceStep {
    loaded: bool,
}

impl InterfaceStep {
    /// Builds the step.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl BootstrapStep for InterfaceStep {
    fn name(&self) -> &'static str {
        "interface"
    }

    fn target(&self) -> BootstrapState {
        BootstrapState::Running
    }

    fn run(&mut self, context: &mut ShellContext) -> Result<StepOutcome, BootstrapFailure> {
        if context.options().start_hidden {
            info!(target: BOOTSTRAP_TARGET, "Starting hidden; interface not loaded");
            return Ok(StepOutcome::Continue);
        }
        let events = context.events().clone();
        context
            .surface_mut()
            .load_ui(&events)
            .map_err(|error| BootstrapFailure::new(FailureKind::Interface, error.to_string()))?;
        self.loaded = true;
        Ok(StepOutcome::Continue)
    }

    fn teardown(&mut self, context: &mut ShellContext) {
        if mem::take(&mut self.loaded) {
            context.surface_mut().unload();
        }
    }
}
