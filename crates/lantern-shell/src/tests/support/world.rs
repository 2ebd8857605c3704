//! BDD test world: owns a temporary shell environment and drives full shell
//! runs through `run_with` with recording collaborators.

use std::cell::RefCell;
use std::fs;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use lantern_config::{Config, RuntimePaths};
use tempfile::TempDir;

use crate::bootstrap::{
    BootstrapState, ConfigLoader, LaunchPlan, ProcessControl, ServiceDeps, StaticConfigLoader,
    run_with,
};
use crate::components::ComponentFactory;
use crate::instance::ActivationRequest;
use crate::platform::UnixPlatform;
use crate::telemetry::{InterceptorScope, log_file_name};
use crate::update::MANIFEST_FILE;

use super::doubles::{
    CapturingPresenter, FailingConfigLoader, Journal, RecordingFaultHandler, RecordingLauncher,
    RecordingSignals, RecordingSurface, scripted_component,
};
use super::reporter::RecordingLifecycleReporter;

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Names of the scripted components, in registration order.
pub const COMPONENT_NAMES: [&str; 2] = ["web_runtime", "helper_link"];

/// Observers shared with one shell run.
#[derive(Clone)]
pub struct Recorders {
    pub journal: Journal,
    pub reporter: Arc<RecordingLifecycleReporter>,
    pub launcher: RecordingLauncher,
    pub presenter: CapturingPresenter,
    pub activations: Arc<Mutex<Vec<ActivationRequest>>>,
    pub signals: RecordingSignals,
}

impl Recorders {
    fn new(shutdown_on_start: bool) -> Self {
        let journal = Journal::default();
        Self {
            signals: RecordingSignals::new(journal.clone(), shutdown_on_start),
            journal,
            reporter: Arc::new(RecordingLifecycleReporter::default()),
            launcher: RecordingLauncher::default(),
            presenter: CapturingPresenter::default(),
            activations: Arc::default(),
        }
    }

    /// Activation requests received by this run's surface.
    #[must_use]
    pub fn activations(&self) -> Vec<ActivationRequest> {
        self.activations
            .lock()
            .expect("activation mutex poisoned")
            .clone()
    }
}

/// Scenario world shared across BDD steps.
pub struct TestWorld {
    _dir: TempDir,
    config: Config,
    failing_loader: bool,
    component_failure: Option<String>,
    primary: Option<thread::JoinHandle<i32>>,
    primary_recorders: Option<Recorders>,
    primary_exit: Option<i32>,
    recorders: Option<Recorders>,
    exit_code: Option<i32>,
    pub output: String,
}

impl TestWorld {
    /// Builds a world whose directories all live under a fresh temp dir.
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temporary shell directory");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .expect("temporary directory was not valid UTF-8");
        let config = Config {
            log_dir: Some(root.join("logs")),
            runtime_dir: Some(root.join("run")),
            crash_dir: Some(root.join("crash")),
            update_dir: Some(root.join("update")),
            ..Config::default()
        };
        Self {
            _dir: dir,
            config,
            failing_loader: false,
            component_failure: None,
            primary: None,
            primary_recorders: None,
            primary_exit: None,
            recorders: None,
            exit_code: None,
            output: String::new(),
        }
    }

    /// Configures the run under test to load configuration from bad input.
    pub fn use_failing_loader(&mut self) {
        self.failing_loader = true;
    }

    /// Makes the second scripted component fail with `message`.
    pub fn fail_component(&mut self, message: &str) {
        self.component_failure = Some(message.to_owned());
    }

    /// Writes an update manifest for `version`.
    pub fn stage_update(&self, version: &str) {
        let directory = self.config.update_dir();
        fs::create_dir_all(&directory).expect("failed to create update directory");
        let manifest = serde_json::json!({
            "version": version,
            "updater": "/usr/bin/lantern-updater",
            "arguments": ["--apply"],
        });
        fs::write(directory.join(MANIFEST_FILE), manifest.to_string())
            .expect("failed to write update manifest");
    }

    /// Starts a primary instance on a background thread and waits until its
    /// interface is up.
    pub fn start_primary(&mut self) -> Result<(), String> {
        if self.primary.is_some() {
            return Err("primary already running".to_owned());
        }
        let recorders = Recorders::new(false);
        let plan = self.plan(
            &recorders,
            Box::new(StaticConfigLoader::new(self.config.clone())),
            None,
        );
        let handle = thread::spawn(move || {
            let mut sink = Vec::new();
            run_with(plan, ["lantern"], &mut sink)
        });
        let reporter = Arc::clone(&recorders.reporter);
        self.primary = Some(handle);
        self.primary_recorders = Some(recorders);

        let deadline = Instant::now() + WAIT_TIMEOUT;
        while Instant::now() < deadline {
            if reporter.reached(BootstrapState::Running) {
                return Ok(());
            }
            thread::sleep(POLL_INTERVAL);
        }
        Err(format!("primary never reached Running: {:?}", reporter.states()))
    }

    /// Delivers a termination signal to the primary and waits for it to exit.
    pub fn stop_primary(&mut self) -> Result<i32, String> {
        let handle = self
            .primary
            .take()
            .ok_or_else(|| "primary not running".to_owned())?;
        let delivered = self
            .primary_recorders
            .as_ref()
            .is_some_and(|recorders| recorders.signals.deliver_termination());
        if !delivered {
            return Err("primary was not listening for signals".to_owned());
        }
        let code = handle
            .join()
            .map_err(|_| "primary thread panicked".to_owned())?;
        self.primary_exit = Some(code);
        Ok(code)
    }

    /// Recorders of the primary instance, once started.
    pub fn primary_recorders(&self) -> Result<&Recorders, String> {
        self.primary_recorders
            .as_ref()
            .ok_or_else(|| "no primary was started".to_owned())
    }

    /// Waits until the primary's surface has received `count` activations.
    pub fn wait_for_primary_activations(
        &self,
        count: usize,
    ) -> Result<Vec<ActivationRequest>, String> {
        let recorders = self.primary_recorders()?;
        let deadline = Instant::now() + WAIT_TIMEOUT;
        loop {
            let activations = recorders.activations();
            if activations.len() >= count {
                return Ok(activations);
            }
            if Instant::now() >= deadline {
                return Err(format!("primary received {activations:?}"));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Runs the shell in the foreground with `arguments` after the program
    /// name. A shown interface quits immediately with status 0; a hidden
    /// start receives a shutdown request as soon as signals are routed.
    pub fn launch(&mut self, arguments: &[&str]) {
        let hidden = arguments.contains(&"--hidden");
        let recorders = Recorders::new(hidden);
        let loader: Box<dyn ConfigLoader> = if self.failing_loader {
            Box::new(FailingConfigLoader)
        } else {
            Box::new(StaticConfigLoader::new(self.config.clone()))
        };
        let plan = self.plan(&recorders, loader, Some(0));
        let mut output = Vec::new();
        let args = std::iter::once("lantern").chain(arguments.iter().copied());
        let code = run_with(plan, args, &mut output);

        self.exit_code = Some(code);
        self.output = String::from_utf8(output).expect("shell output was not UTF-8");
        self.recorders = Some(recorders);
    }

    fn plan(
        &self,
        recorders: &Recorders,
        loader: Box<dyn ConfigLoader>,
        quit_on_load: Option<i32>,
    ) -> LaunchPlan {
        let components: Vec<ComponentFactory> = vec![
            scripted_component(COMPONENT_NAMES[0], &recorders.journal, None),
            scripted_component(
                COMPONENT_NAMES[1],
                &recorders.journal,
                self.component_failure.clone(),
            ),
        ];
        LaunchPlan {
            process: ProcessControl {
                platform: Box::new(UnixPlatform),
                faults: Box::new(RecordingFaultHandler::new(recorders.journal.clone())),
                signals: Box::new(recorders.signals.clone()),
                interceptor: InterceptorScope::Thread,
            },
            services: ServiceDeps {
                loader,
                reporter: recorders.reporter.clone(),
                launcher: Box::new(recorders.launcher.clone()),
                components,
                surface: Box::new(RecordingSurface::new(
                    recorders.journal.clone(),
                    Arc::clone(&recorders.activations),
                    quit_on_load,
                )),
                presenter: Box::new(recorders.presenter.clone()),
            },
        }
    }

    /// Recorders of the last finished run.
    pub fn recorders(&self) -> Result<&Recorders, String> {
        self.recorders
            .as_ref()
            .ok_or_else(|| "the shell has not run yet".to_owned())
    }

    /// Exit status of the last foreground run.
    pub fn exit_code(&self) -> Result<i32, String> {
        self.exit_code
            .ok_or_else(|| "the shell has not run yet".to_owned())
    }

    /// Exit status of the primary once stopped.
    #[must_use]
    pub fn primary_exit(&self) -> Option<i32> {
        self.primary_exit
    }

    /// Content of the active log file, or empty when none was written.
    #[must_use]
    pub fn log_content(&self) -> String {
        fs::read_to_string(self.config.log_dir().join(log_file_name())).unwrap_or_default()
    }

    /// Runtime artefacts of the instance guard.
    #[must_use]
    pub fn runtime_paths(&self) -> RuntimePaths {
        RuntimePaths::from_config(&self.config).expect("runtime paths should resolve")
    }
}

impl Drop for TestWorld {
    fn drop(&mut self) {
        if let Some(handle) = self.primary.take() {
            if let Some(recorders) = &self.primary_recorders {
                recorders.signals.deliver_termination();
            }
            let _ = handle.join();
        }
    }
}

/// Fixture building a fresh world.
#[must_use]
pub fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}
