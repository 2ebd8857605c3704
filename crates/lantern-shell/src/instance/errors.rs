//! Error surface for the single-instance guard and its activation channel.

use std::io;
use std::path::PathBuf;

use lantern_config::RuntimePathsError;
use nix::errno::Errno;
use thiserror::Error;

/// Errors raised while acquiring the instance lock.
#[derive(Debug, Error)]
pub enum InstanceError {
    /// The runtime directory could not be prepared.
    #[error(transparent)]
    RuntimePaths(#[from] RuntimePathsError),
    /// Lock file creation failed for a reason other than contention.
    #[error("failed to create lock file '{path}': {source}")]
    LockCreate {
        /// Lock file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Writing the PID file failed.
    #[error("failed to write pid file '{path}': {source}")]
    PidWrite {
        /// PID file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Taking the advisory lock failed for a reason other than contention.
    #[error("failed to lock '{path}': {source}")]
    Lock {
        /// Lock file path.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// A live instance holds the lock but never answered the activation
    /// request.
    #[error(
        "instance lock '{lock}' is held by an instance that is not responding (pid {})",
        .pid.map_or_else(|| "unknown".to_owned(), |pid| pid.to_string())
    )]
    Contended {
        /// Lock file path.
        lock: PathBuf,
        /// Pid recorded by the owner, when readable.
        pid: Option<u32>,
    },
    /// The activation listener could not be started.
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Errors surfaced while binding or running the activation listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Switching the listener to non-blocking mode failed.
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Binding the socket failed.
    #[error("failed to bind activation socket at {path}: {source}")]
    Bind {
        /// Socket path.
        path: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A live listener already owns the socket path.
    #[error("activation socket {path} is already in use")]
    InUse {
        /// Socket path.
        path: String,
    },
    /// Something other than a socket occupies the path.
    #[error("activation socket path {path} is not a socket")]
    NotSocket {
        /// Offending path.
        path: String,
    },
    /// Reading metadata for an existing path failed.
    #[error("failed to read metadata for activation socket {path}: {source}")]
    Metadata {
        /// Socket path.
        path: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Probing an existing socket failed unexpectedly.
    #[error("failed to connect to existing activation socket {path}: {source}")]
    Connect {
        /// Socket path.
        path: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Removing a stale socket failed.
    #[error("failed to remove stale activation socket {path}: {source}")]
    Cleanup {
        /// Socket path.
        path: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The accept thread panicked.
    #[error("activation listener thread panicked")]
    ThreadPanic,
}
