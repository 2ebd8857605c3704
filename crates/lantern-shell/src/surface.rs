//! Boundary to the primary user interface.

use thiserror::Error;

use crate::event_loop::LoopHandle;
use crate::instance::ActivationRequest;

/// Error raised when the interface cannot be constructed.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SurfaceError {
    message: String,
}

impl SurfaceError {
    /// Builds an error carrying `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The window, or whatever stands in for it, driven by the main loop.
pub trait ShellSurface: Send {
    /// Builds the interface. `events` lets it ask the loop to quit.
    fn load_ui(&mut self, events: &LoopHandle) -> Result<(), SurfaceError>;

    /// Brings the interface forward for a secondary launch.
    fn activate(&mut self, request: &ActivationRequest);

    /// Tears the interface down. Called at most once per successful load.
    fn unload(&mut self);
}
