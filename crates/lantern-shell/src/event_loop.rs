//! Main-thread event loop.
//!
//! Background threads (the activation listener and the signal forwarder)
//! never touch the surface directly; they post [`LoopEvent`]s through a
//! [`LoopHandle`] and the loop applies them on the thread that owns the
//! surface.

use std::sync::mpsc::{self, Receiver, Sender};

use tracing::{debug, info};

use crate::instance::{ActivationRequest, ActivationSink};
use crate::surface::ShellSurface;

const LOOP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::event_loop");

/// Why the loop was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// A termination signal arrived.
    Signal(i32),
    /// The surface or a component asked to exit.
    Requested,
}

/// Message marshalled onto the main loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    /// A secondary launch forwarded its intent.
    Activate(ActivationRequest),
    /// Leave the loop with status 0.
    Shutdown(ShutdownReason),
    /// Leave the loop with the given status.
    Quit(i32),
}

/// Cloneable sender side of the loop.
#[derive(Debug, Clone)]
pub struct LoopHandle {
    sender: Sender<LoopEvent>,
}

impl LoopHandle {
    /// Posts `event`. Returns `false` once the loop is gone.
    pub fn post(&self, event: LoopEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    /// Asks the loop to exit with status 0.
    pub fn request_shutdown(&self, reason: ShutdownReason) -> bool {
        self.post(LoopEvent::Shutdown(reason))
    }

    /// Asks the loop to exit with `code`.
    pub fn quit(&self, code: i32) -> bool {
        self.post(LoopEvent::Quit(code))
    }
}

impl ActivationSink for LoopHandle {
    fn deliver(&self, request: ActivationRequest) {
        if !self.post(LoopEvent::Activate(request)) {
            debug!(target: LOOP_TARGET, "activation arrived after the loop exited");
        }
    }
}

/// Receiver side of the loop, owned by the main thread.
#[derive(Debug)]
pub struct MainLoop {
    sender: Sender<LoopEvent>,
    receiver: Receiver<LoopEvent>,
}

impl MainLoop {
    /// Builds an idle loop.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { sender, receiver }
    }

    /// Returns a handle posting into this loop.
    #[must_use]
    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            sender: self.sender.clone(),
        }
    }

    /// Dispatches events to `surface` until asked to stop, returning the
    /// process exit status.
    pub fn run(&self, surface: &mut dyn ShellSurface) -> i32 {
        info!(target: LOOP_TARGET, "entering main loop");
        loop {
            // The loop holds a sender itself, so `recv` only fails if the
            // channel is torn down underneath it.
            let Ok(event) = self.receiver.recv() else {
                return 0;
            };
            match event {
                LoopEvent::Activate(request) => surface.activate(&request),
                LoopEvent::Shutdown(reason) => {
                    info!(target: LOOP_TARGET, ?reason, "leaving main loop");
                    return 0;
                }
                LoopEvent::Quit(code) => {
                    info!(target: LOOP_TARGET, code, "leaving main loop");
                    return code;
                }
            }
        }
    }
}

impl Default for MainLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::SurfaceError;

    #[derive(Default)]
    struct CountingSurface {
        activations: Vec<ActivationRequest>,
    }

    impl ShellSurface for CountingSurface {
        fn load_ui(&mut self, _events: &LoopHandle) -> Result<(), SurfaceError> {
            Ok(())
        }

        fn activate(&mut self, request: &ActivationRequest) {
            self.activations.push(request.clone());
        }

        fn unload(&mut self) {}
    }

    #[test]
    fn activations_reach_the_surface_before_quit() {
        let main_loop = MainLoop::new();
        let handle = main_loop.handle();
        let request = ActivationRequest {
            pid: 1,
            arguments: Vec::new(),
            show: true,
        };
        handle.deliver(request.clone());
        handle.quit(7);
        let mut surface = CountingSurface::default();

        let code = main_loop.run(&mut surface);

        assert_eq!(code, 7);
        assert_eq!(surface.activations, vec![request]);
    }

    #[test]
    fn shutdown_exits_with_success() {
        let main_loop = MainLoop::new();
        let handle = main_loop.handle();
        let worker = std::thread::spawn(move || {
            handle.request_shutdown(ShutdownReason::Signal(libc::SIGTERM))
        });

        let code = main_loop.run(&mut CountingSurface::default());

        assert_eq!(code, 0);
        assert!(worker.join().expect("join poster"));
    }
}
