//! Connection to the optional helper process.

use std::net::Shutdown;
use std::os::unix::net::UnixStream;

use tracing::{debug, info, warn};

use super::{COMPONENT_TARGET, Component, ComponentContext, ComponentError};

/// Link to the helper's Unix socket.
///
/// The helper is optional: a missing or unreachable helper is logged and the
/// shell carries on without it.
#[derive(Debug, Default)]
pub struct HelperLink {
    stream: Option<UnixStream>,
}

impl HelperLink {
    /// Builds a disconnected link.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the helper answered.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

impl Component for HelperLink {
    fn name(&self) -> &'static str {
        "helper"
    }

    fn initialize(&mut self, context: &ComponentContext<'_>) -> Result<(), ComponentError> {
        let Some(socket) = context.config.helper_socket.as_ref() else {
            debug!(target: COMPONENT_TARGET, "no helper configured");
            return Ok(());
        };
        match UnixStream::connect(socket) {
            Ok(stream) => {
                info!(
                    target: COMPONENT_TARGET,
                    socket = %socket,
                    "connected to helper"
                );
                self.stream = Some(stream);
            }
            Err(error) => {
                warn!(
                    target: COMPONENT_TARGET,
                    socket = %socket,
                    error = %error,
                    "helper unavailable; continuing without it"
                );
            }
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        if let Some(stream) = self.stream.take()
            && let Err(error) = stream.shutdown(Shutdown::Both)
        {
            debug!(
                target: COMPONENT_TARGET,
                error = %error,
                "helper connection already closed"
            );
        }
    }
}
