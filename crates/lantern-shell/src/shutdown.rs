//! Forwards termination signals onto the main loop.

use std::io;
use std::thread::{self, JoinHandle};

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use thiserror::Error;
use tracing::{info, warn};

use crate::event_loop::{LoopHandle, ShutdownReason};

const SHUTDOWN_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::shutdown");

/// Signals that end the main loop.
pub const TERMINATION_SIGNALS: [i32; 4] = [SIGTERM, SIGINT, SIGQUIT, SIGHUP];

/// Errors reported by signal forwarders.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Seam over the mechanism turning OS signals into loop events.
pub trait SignalForwarding: Send {
    /// Starts forwarding into `events`.
    fn start(&mut self, events: LoopHandle) -> Result<(), ShutdownError>;

    /// Stops forwarding. Must be idempotent.
    fn stop(&mut self);
}

/// Forwarder backed by a `signal-hook` iterator thread.
#[derive(Debug, Default)]
pub struct SystemSignalForwarder {
    handle: Option<Handle>,
    thread: Option<JoinHandle<()>>,
}

impl SystemSignalForwarder {
    /// Builds an idle forwarder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SignalForwarding for SystemSignalForwarder {
    fn start(&mut self, events: LoopHandle) -> Result<(), ShutdownError> {
        let mut signals =
            Signals::new(TERMINATION_SIGNALS).map_err(|source| ShutdownError::Install { source })?;
        self.handle = Some(signals.handle());
        self.thread = Some(thread::spawn(move || {
            for signal in signals.forever() {
                info!(
                    target: SHUTDOWN_TARGET,
                    signal,
                    "shutdown signal received"
                );
                if !events.request_shutdown(ShutdownReason::Signal(signal)) {
                    break;
                }
            }
        }));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.close();
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!(target: SHUTDOWN_TARGET, "signal forwarder thread panicked");
        }
    }
}

impl Drop for SystemSignalForwarder {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_loop::{LoopEvent, MainLoop};

    #[test]
    fn stop_without_start_is_harmless() {
        let mut forwarder = SystemSignalForwarder::new();
        forwarder.stop();
        forwarder.stop();
    }

    #[test]
    fn start_then_stop_joins_the_thread() {
        let main_loop = MainLoop::new();
        let handle = main_loop.handle();
        let mut forwarder = SystemSignalForwarder::new();

        forwarder.start(handle.clone()).expect("start forwarder");
        forwarder.stop();

        assert!(handle.post(LoopEvent::Quit(0)));
    }
}
