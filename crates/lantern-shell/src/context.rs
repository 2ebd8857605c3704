//! State shared by the bootstrap steps.
//!
//! A single [`ShellContext`] is built once the configuration is known and
//! handed by reference to every step; nothing is looked up globally.

use std::ffi::OsString;
use std::mem;
use std::sync::Arc;

use lantern_config::{Config, RenderBackend};

use crate::bootstrap::BootstrapFailure;
use crate::cli::LaunchOptions;
use crate::components::ComponentContext;
use crate::event_loop::LoopHandle;
use crate::platform::Platform;
use crate::surface::ShellSurface;
use crate::telemetry::{LogPipeline, Severity};
use crate::update::UpdateDecision;

/// Context threaded through the bootstrap sequence.
pub struct ShellContext {
    config: Config,
    options: LaunchOptions,
    platform: Box<dyn Platform>,
    render_backend: RenderBackend,
    runtime_arguments: Vec<OsString>,
    events: LoopHandle,
    surface: Box<dyn ShellSurface>,
    pipeline: Option<Arc<LogPipeline>>,
    update_decision: Option<UpdateDecision>,
    deferred_warnings: Vec<String>,
}

impl ShellContext {
    /// Performs environment setup: resolves the render backend for this
    /// platform and assembles the pass-through arguments.
    ///
    /// Problems found here are kept until logging is available.
    #[must_use]
    pub fn new(
        config: Config,
        options: LaunchOptions,
        platform: Box<dyn Platform>,
        events: LoopHandle,
        surface: Box<dyn ShellSurface>,
    ) -> Self {
        let mut deferred_warnings = Vec::new();
        let requested = config.render_backend();
        if let Some(rejected) = requested.rejected() {
            deferred_warnings.push(format!(
                "Invalid render backend '{rejected}'; using {}",
                requested.value()
            ));
        }
        let render_backend = platform.apply_render_backend(requested.value());
        let runtime_arguments = options
            .passthrough
            .iter()
            .cloned()
            .chain(platform.runtime_switches().iter().map(OsString::from))
            .collect();
        Self {
            config,
            options,
            platform,
            render_backend,
            runtime_arguments,
            events,
            surface,
            pipeline: None,
            update_decision: None,
            deferred_warnings,
        }
    }

    /// Resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Parsed command line.
    #[must_use]
    pub fn options(&self) -> &LaunchOptions {
        &self.options
    }

    /// Platform selected at startup.
    #[must_use]
    pub fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }

    /// Render backend, fixed for the lifetime of the process.
    #[must_use]
    pub fn render_backend(&self) -> RenderBackend {
        self.render_backend
    }

    /// Arguments handed to dependent subsystems.
    #[must_use]
    pub fn runtime_arguments(&self) -> &[OsString] {
        &self.runtime_arguments
    }

    /// Handle posting into the main loop.
    #[must_use]
    pub fn events(&self) -> &LoopHandle {
        &self.events
    }

    /// The interface driven by the main loop.
    pub fn surface_mut(&mut self) -> &mut dyn ShellSurface {
        self.surface.as_mut()
    }

    /// Logging pipeline, once the logging step has run.
    #[must_use]
    pub fn pipeline(&self) -> Option<&Arc<LogPipeline>> {
        self.pipeline.as_ref()
    }

    pub(crate) fn set_pipeline(&mut self, pipeline: Arc<LogPipeline>) {
        self.pipeline = Some(pipeline);
    }

    pub(crate) fn take_pipeline(&mut self) -> Option<Arc<LogPipeline>> {
        self.pipeline.take()
    }

    /// Decision reached by the update step, once it has run.
    #[must_use]
    pub fn update_decision(&self) -> Option<UpdateDecision> {
        self.update_decision
    }

    pub(crate) fn set_update_decision(&mut self, decision: UpdateDecision) {
        self.update_decision = Some(decision);
    }

    pub(crate) fn take_deferred_warnings(&mut self) -> Vec<String> {
        mem::take(&mut self.deferred_warnings)
    }

    /// View handed to components while they initialise.
    #[must_use]
    pub fn component_context(&self) -> ComponentContext<'_> {
        ComponentContext {
            config: &self.config,
            platform: self.platform.as_ref(),
            arguments: &self.runtime_arguments,
            render_backend: self.render_backend,
        }
    }

    /// Records `failure` at fatal severity when logging is up.
    pub(crate) fn log_fatal(&self, failure: &BootstrapFailure) {
        if let Some(pipeline) = &self.pipeline {
            pipeline.log(
                Severity::Fatal,
                &format!("Unhandled bootstrap failure ({}): {failure}", failure.kind()),
            );
            pipeline.flush();
        }
    }
}

impl std::fmt::Debug for ShellContext {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ShellContext")
            .field("config", &self.config)
            .field("options", &self.options)
            .field("platform", &self.platform.name())
            .field("render_backend", &self.render_backend)
            .field("update_decision", &self.update_decision)
            .finish_non_exhaustive()
    }
}
