//! Recording stand-ins for the process-level collaborators of the shell.
//!
//! Every double appends to a shared [`Journal`] so scenarios can assert the
//! order in which steps ran and were torn down.

use std::ffi::OsString;
use std::path::Path;
use std::sync::{Arc, Mutex};

use lantern_config::{Config, ConfigResult};
use ortho_config::OrthoConfig;

use crate::bootstrap::ConfigLoader;
use crate::components::{Component, ComponentContext, ComponentError, ComponentFactory};
use crate::crash::{CrashCaptureError, FaultHandler};
use crate::event_loop::{LoopHandle, ShutdownReason};
use crate::fallback::ErrorPresenter;
use crate::instance::ActivationRequest;
use crate::shutdown::{ShutdownError, SignalForwarding};
use crate::surface::{ShellSurface, SurfaceError};
use crate::update::{PendingUpdate, UpdateError, UpdaterLauncher};

/// Ordered log of collaborator calls shared by the doubles of one run.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.entries
            .lock()
            .expect("journal mutex poisoned")
            .push(entry.into());
    }

    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().expect("journal mutex poisoned").clone()
    }

    #[must_use]
    pub fn contains(&self, entry: &str) -> bool {
        self.entries().iter().any(|recorded| recorded == entry)
    }

    /// Entries recorded after the first occurrence of `marker`.
    #[must_use]
    pub fn after(&self, marker: &str) -> Vec<String> {
        self.entries()
            .into_iter()
            .skip_while(|entry| entry != marker)
            .skip(1)
            .collect()
    }
}

/// Fault handler that records install and uninstall without touching
/// process-wide signal dispositions.
pub struct RecordingFaultHandler {
    journal: Journal,
}

impl RecordingFaultHandler {
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }
}

impl FaultHandler for RecordingFaultHandler {
    fn install(&mut self, crash_dir: &Path) -> Result<(), CrashCaptureError> {
        if !crash_dir.is_absolute() {
            return Err(CrashCaptureError::CreateDirectory {
                path: crash_dir.to_path_buf(),
                source: std::io::Error::other("crash directory must be absolute"),
            });
        }
        self.journal.record("crash:install");
        Ok(())
    }

    fn uninstall(&mut self) {
        self.journal.record("crash:uninstall");
    }
}

/// Signal forwarder that hands its loop handle to the test instead of
/// listening for real signals.
#[derive(Clone)]
pub struct RecordingSignals {
    journal: Journal,
    handle: Arc<Mutex<Option<LoopHandle>>>,
    shutdown_on_start: bool,
}

impl RecordingSignals {
    pub fn new(journal: Journal, shutdown_on_start: bool) -> Self {
        Self {
            journal,
            handle: Arc::default(),
            shutdown_on_start,
        }
    }

    /// Simulates a termination signal. Returns false before `start`.
    pub fn deliver_termination(&self) -> bool {
        self.handle
            .lock()
            .expect("signal handle mutex poisoned")
            .as_ref()
            .is_some_and(|handle| handle.request_shutdown(ShutdownReason::Signal(libc::SIGTERM)))
    }
}

impl SignalForwarding for RecordingSignals {
    fn start(&mut self, events: LoopHandle) -> Result<(), ShutdownError> {
        self.journal.record("signals:start");
        if self.shutdown_on_start {
            events.request_shutdown(ShutdownReason::Requested);
        }
        *self.handle.lock().expect("signal handle mutex poisoned") = Some(events);
        Ok(())
    }

    fn stop(&mut self) {
        self.journal.record("signals:stop");
        self.handle
            .lock()
            .expect("signal handle mutex poisoned")
            .take();
    }
}

/// Component whose initialisation succeeds or fails as scripted.
struct ScriptedComponent {
    name: &'static str,
    journal: Journal,
    failure: Option<String>,
}

impl Component for ScriptedComponent {
    fn name(&self) -> &'static str {
        self.name
    }

    fn initialize(&mut self, _context: &ComponentContext<'_>) -> Result<(), ComponentError> {
        self.journal.record(format!("component:{}:init", self.name));
        match &self.failure {
            Some(message) => Err(ComponentError::new(self.name, message.clone())),
            None => Ok(()),
        }
    }

    fn shutdown(&mut self) {
        self.journal.record(format!("component:{}:shutdown", self.name));
    }
}

/// Factory recording construction of a scripted component.
pub fn scripted_component(
    name: &'static str,
    journal: &Journal,
    failure: Option<String>,
) -> ComponentFactory {
    let journal = journal.clone();
    Box::new(move || {
        journal.record(format!("component:{name}:construct"));
        Box::new(ScriptedComponent {
            name,
            journal,
            failure,
        }) as Box<dyn Component>
    })
}

/// Surface recording its lifecycle and any forwarded activations.
pub struct RecordingSurface {
    journal: Journal,
    activations: Arc<Mutex<Vec<ActivationRequest>>>,
    quit_on_load: Option<i32>,
}

impl RecordingSurface {
    pub fn new(
        journal: Journal,
        activations: Arc<Mutex<Vec<ActivationRequest>>>,
        quit_on_load: Option<i32>,
    ) -> Self {
        Self {
            journal,
            activations,
            quit_on_load,
        }
    }
}

impl ShellSurface for RecordingSurface {
    fn load_ui(&mut self, events: &LoopHandle) -> Result<(), SurfaceError> {
        self.journal.record("surface:load");
        if let Some(code) = self.quit_on_load {
            events.quit(code);
        }
        Ok(())
    }

    fn activate(&mut self, request: &ActivationRequest) {
        self.journal.record("surface:activate");
        self.activations
            .lock()
            .expect("activation mutex poisoned")
            .push(request.clone());
    }

    fn unload(&mut self) {
        self.journal.record("surface:unload");
    }
}

/// Presenter capturing what the fallback surface would have shown.
#[derive(Clone, Default)]
pub struct CapturingPresenter {
    shown: Arc<Mutex<Vec<(String, String)>>>,
}

impl CapturingPresenter {
    #[must_use]
    pub fn shown(&self) -> Vec<(String, String)> {
        self.shown.lock().expect("presenter mutex poisoned").clone()
    }
}

impl ErrorPresenter for CapturingPresenter {
    fn show(&mut self, title: &str, text: &str) {
        self.shown
            .lock()
            .expect("presenter mutex poisoned")
            .push((title.to_owned(), text.to_owned()));
    }
}

/// Updater launcher that records requests instead of spawning processes.
#[derive(Clone, Default)]
pub struct RecordingLauncher {
    launched: Arc<Mutex<Vec<PendingUpdate>>>,
}

impl RecordingLauncher {
    #[must_use]
    pub fn launched(&self) -> Vec<PendingUpdate> {
        self.launched.lock().expect("launcher mutex poisoned").clone()
    }
}

impl UpdaterLauncher for RecordingLauncher {
    fn launch(&self, update: &PendingUpdate) -> Result<u32, UpdateError> {
        self.launched
            .lock()
            .expect("launcher mutex poisoned")
            .push(update.clone());
        Ok(4242)
    }
}

/// Loader that intentionally fails by passing an unparsable value.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self, _arguments: &[OsString]) -> ConfigResult {
        let args = vec![
            OsString::from("lantern"),
            OsString::from("--log-max-files"),
            OsString::from("several"),
        ];
        Config::load_from_iter(args)
    }
}
