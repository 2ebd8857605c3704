//! Preparation of the embedded web runtime's launch parameters.

use std::ffi::OsString;

use lantern_config::RenderBackend;
use tracing::{debug, info};

use super::{COMPONENT_TARGET, Component, ComponentContext, ComponentError};

/// Address the remote inspector listens on when enabled.
pub const REMOTE_INSPECTOR_ADDRESS: &str = "0.0.0.0:9992";

/// Parameters the web runtime is started with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeLaunch {
    /// Arguments forwarded to the runtime.
    pub arguments: Vec<OsString>,
    /// Remote debugging address, when enabled.
    pub remote_inspector: Option<&'static str>,
    /// Backend the runtime renders with.
    pub render_backend: RenderBackend,
}

/// Web runtime component.
#[derive(Debug, Default)]
pub struct WebRuntime {
    launch: Option<RuntimeLaunch>,
}

impl WebRuntime {
    /// Builds an unprepared runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Launch parameters, once initialised.
    #[must_use]
    pub fn launch(&self) -> Option<&RuntimeLaunch> {
        self.launch.as_ref()
    }
}

impl Component for WebRuntime {
    fn name(&self) -> &'static str {
        "web_runtime"
    }

    fn initialize(&mut self, context: &ComponentContext<'_>) -> Result<(), ComponentError> {
        let remote_inspector = context
            .config
            .remote_inspector
            .then_some(REMOTE_INSPECTOR_ADDRESS);
        if let Some(address) = remote_inspector {
            info!(
                target: COMPONENT_TARGET,
                address,
                "remote inspector enabled"
            );
        }
        let launch = RuntimeLaunch {
            arguments: context.arguments.to_vec(),
            remote_inspector,
            render_backend: context.render_backend,
        };
        debug!(
            target: COMPONENT_TARGET,
            arguments = ?launch.arguments,
            backend = %launch.render_backend,
            "web runtime prepared"
        );
        // Runtime start-up resets the process locale.
        context.platform.restore_numeric_locale();
        self.launch = Some(launch);
        Ok(())
    }

    fn shutdown(&mut self) {
        self.launch = None;
    }
}
