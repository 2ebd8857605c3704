//! Single-instance enforcement.

use std::thread;
use std::time::{Duration, Instant};

use lantern_config::RuntimePaths;
use tracing::{debug, info, warn};

use super::INSTANCE_TARGET;
use super::activation::{ActivationOutcome, ActivationRequest, send_activation};
use super::errors::InstanceError;
use super::lock::{InstanceLock, read_pid};

const RETRY_INTERVAL: Duration = Duration::from_millis(50);
const MIN_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(100);

/// Outcome of [`InstanceGuard::ensure_unique`].
#[derive(Debug)]
pub enum Acquisition {
    /// This process owns the lock and must serve activation requests.
    Primary(InstanceLock),
    /// A running instance accepted this process's activation request.
    Secondary,
}

/// Guards the per-session instance lock.
#[derive(Debug, Clone)]
pub struct InstanceGuard {
    paths: RuntimePaths,
    timeout: Duration,
}

impl InstanceGuard {
    /// Builds a guard over `paths`, waiting at most `timeout` for a running
    /// instance to answer.
    #[must_use]
    pub fn new(paths: RuntimePaths, timeout: Duration) -> Self {
        Self { paths, timeout }
    }

    /// Runtime layout guarded by this instance.
    #[must_use]
    pub fn paths(&self) -> &RuntimePaths {
        &self.paths
    }

    /// Acquires the lock, or hands `request` to the instance holding it.
    ///
    /// The lock is a kernel advisory lock, so files left by an owner that
    /// died are taken over directly. While a live owner holds it, the request
    /// is retried until the owner answers, the owner exits and the lock comes
    /// free, or the timeout runs out.
    pub fn ensure_unique(&self, request: &ActivationRequest) -> Result<Acquisition, InstanceError> {
        let deadline = Instant::now() + self.timeout;
        let socket = self.paths.socket_path();
        loop {
            if let Some(lock) = InstanceLock::try_acquire(&self.paths)? {
                return Ok(Acquisition::Primary(lock));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            match send_activation(socket, request, remaining.max(MIN_ATTEMPT_TIMEOUT)) {
                ActivationOutcome::Delivered => {
                    info!(
                        target: INSTANCE_TARGET,
                        socket = %socket.display(),
                        "activation handed to running instance"
                    );
                    return Ok(Acquisition::Secondary);
                }
                ActivationOutcome::Unreachable(error) => {
                    debug!(
                        target: INSTANCE_TARGET,
                        error = %error,
                        "running instance did not answer"
                    );
                }
            }

            if Instant::now() >= deadline {
                let pid = read_pid(self.paths.pid_path());
                warn!(
                    target: INSTANCE_TARGET,
                    lock = %self.paths.lock_path().display(),
                    pid,
                    timeout_ms = self.timeout.as_millis(),
                    "instance lock owner is alive but not responding"
                );
                return Err(InstanceError::Contended {
                    lock: self.paths.lock_path().to_path_buf(),
                    pid,
                });
            }
            thread::sleep(RETRY_INTERVAL);
        }
    }
}
