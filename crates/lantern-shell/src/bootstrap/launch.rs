//! Wires the production collaborators into the bootstrap sequence and drives
//! the shell from the first argument to the exit status.

use std::ffi::OsString;
use std::io::{self, Write};
use std::sync::Arc;

use lantern_config::{Config, ConfigResult};
use ortho_config::OrthoConfig;
use tracing::info;

use super::{
    BOOTSTRAP_TARGET, BootstrapFailure, BootstrapStep, ComponentsStep, CrashCaptureStep,
    FailureKind, InstanceStep, InterfaceStep, LoggingStep, Sequencer, Startup, UpdateStep,
};
use crate::cli::LaunchOptions;
use crate::components::{ComponentFactory, builtin_components};
use crate::context::ShellContext;
use crate::crash::{FaultHandler, SystemFaultHandler};
use crate::event_loop::MainLoop;
use crate::fallback::{self, ConsolePresenter, ErrorPresenter};
use crate::health::{LifecycleReporter, StructuredLifecycleReporter};
use crate::placeholder_shell::HeadlessSurface;
use crate::platform::{self, Platform};
use crate::shutdown::{SignalForwarding, SystemSignalForwarder};
use crate::surface::ShellSurface;
use crate::telemetry::InterceptorScope;
use crate::update::{SystemUpdaterLauncher, UpdaterLauncher};

const LICENSES: &str = include_str!("../../licenses.txt");

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the shell configuration from the configuration arguments.
    fn load(&self, arguments: &[OsString]) -> ConfigResult;
}

/// Loader that delegates to the layered [`Config`] loader.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self, arguments: &[OsString]) -> ConfigResult {
        Config::load_from_iter(arguments.iter().cloned())
    }
}

/// Loader returning a fixed configuration regardless of the arguments.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Builds a loader that always yields `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self, _arguments: &[OsString]) -> ConfigResult {
        Ok(self.config.clone())
    }
}

/// Process-level collaborators: signals, faults and the platform.
pub(crate) struct ProcessControl {
    pub(crate) platform: Box<dyn Platform>,
    pub(crate) faults: Box<dyn FaultHandler>,
    pub(crate) signals: Box<dyn SignalForwarding>,
    pub(crate) interceptor: InterceptorScope,
}

/// Service dependencies required to bring the shell up.
pub(crate) struct ServiceDeps {
    pub(crate) loader: Box<dyn ConfigLoader>,
    pub(crate) reporter: Arc<dyn LifecycleReporter>,
    pub(crate) launcher: Box<dyn UpdaterLauncher>,
    pub(crate) components: Vec<ComponentFactory>,
    pub(crate) surface: Box<dyn ShellSurface>,
    pub(crate) presenter: Box<dyn ErrorPresenter>,
}

/// Collaborators required to launch the shell.
pub(crate) struct LaunchPlan {
    pub(crate) process: ProcessControl,
    pub(crate) services: ServiceDeps,
}

impl LaunchPlan {
    pub(crate) fn production() -> Self {
        Self {
            process: ProcessControl {
                platform: platform::detect(),
                faults: Box::new(SystemFaultHandler::default()),
                signals: Box::new(SystemSignalForwarder::new()),
                interceptor: InterceptorScope::Global,
            },
            services: ServiceDeps {
                loader: Box::new(SystemConfigLoader),
                reporter: Arc::new(StructuredLifecycleReporter::new()),
                launcher: Box::new(SystemUpdaterLauncher),
                components: builtin_components(),
                surface: Box::new(HeadlessSurface::new()),
                presenter: Box::new(ConsolePresenter),
            },
        }
    }
}

/// Runs the shell with the production collaborators and returns the process
/// exit status.
pub fn run<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_with(LaunchPlan::production(), args, &mut out)
}

/// Runs the shell with injected collaborators.
pub(crate) fn run_with<I, T>(plan: LaunchPlan, args: I, out: &mut dyn Write) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let LaunchPlan { process, services } = plan;
    let ProcessControl {
        platform,
        faults,
        signals,
        interceptor,
    } = process;
    let ServiceDeps {
        loader,
        reporter,
        launcher,
        components,
        surface,
        mut presenter,
    } = services;

    let steps: Vec<Box<dyn BootstrapStep>> = vec![
        Box::new(CrashCaptureStep::new(faults)),
        Box::new(InstanceStep::new(signals)),
        Box::new(LoggingStep::new(interceptor)),
        Box::new(UpdateStep::new(launcher)),
        Box::new(ComponentsStep::new(components)),
        Box::new(InterfaceStep::new()),
    ];
    let mut sequencer = Sequencer::new(steps, reporter);

    let options = match LaunchOptions::parse(args) {
        Ok(options) => options,
        Err(error) => {
            let failure = BootstrapFailure::new(FailureKind::Configuration, error.to_string());
            sequencer.fail(&failure);
            return fallback::present(presenter.as_mut(), failure.message());
        }
    };

    if options.show_licenses {
        // A closed stdout is not worth a fallback dialog.
        let _ = out.write_all(LICENSES.as_bytes()).and_then(|()| out.flush());
        return 0;
    }

    let config = match loader.load(&options.loader_arguments()) {
        Ok(config) => config,
        Err(error) => {
            let failure = BootstrapFailure::new(
                FailureKind::Configuration,
                format!("failed to load configuration: {error}"),
            );
            sequencer.fail(&failure);
            return fallback::present(presenter.as_mut(), failure.message());
        }
    };

    let main_loop = MainLoop::new();
    let mut context = ShellContext::new(config, options, platform, main_loop.handle(), surface);
    match sequencer.start(&mut context) {
        Startup::Ready => {
            let code = main_loop.run(context.surface_mut());
            info!(target: BOOTSTRAP_TARGET, code, "main loop finished");
            sequencer.shutdown(&mut context);
            code
        }
        Startup::Exit(_) => {
            sequencer.unwind(&mut context);
            0
        }
        Startup::Failed(failure) => {
            context.log_fatal(&failure);
            sequencer.unwind(&mut context);
            fallback::present(presenter.as_mut(), failure.message())
        }
    }
}
