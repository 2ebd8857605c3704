//! Placeholder surface used until a windowing front end is attached.

use crate::event_loop::LoopHandle;
use crate::instance::ActivationRequest;
use crate::surface::{ShellSurface, SurfaceError};

const SURFACE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::surface::headless");

/// Surface that records lifecycle calls without drawing anything.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    loaded: bool,
    activations: usize,
}

impl HeadlessSurface {
    /// Builds an unloaded surface.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `load_ui` succeeded and `unload` has not run since.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Number of activation requests received.
    #[must_use]
    pub fn activations(&self) -> usize {
        self.activations
    }
}

impl ShellSurface for HeadlessSurface {
    fn load_ui(&mut self, _events: &LoopHandle) -> Result<(), SurfaceError> {
        tracing::info!(target: SURFACE_TARGET, "headless interface loaded");
        self.loaded = true;
        Ok(())
    }

    fn activate(&mut self, request: &ActivationRequest) {
        self.activations += 1;
        tracing::info!(
            target: SURFACE_TARGET,
            pid = request.pid,
            show = request.show,
            arguments = ?request.arguments,
            "activation requested by secondary launch"
        );
    }

    fn unload(&mut self) {
        if self.loaded {
            tracing::info!(target: SURFACE_TARGET, "headless interface unloaded");
            self.loaded = false;
        }
    }
}
