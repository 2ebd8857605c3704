//! Startup update gate.
//!
//! Updates are downloaded and staged by a separate updater. At startup the
//! shell only looks for a staged manifest and, when one names a different
//! version, launches the updater and asks the bootstrap to stop before any
//! heavy component exists.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

const UPDATE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::update");

/// Name of the manifest written by the updater into the update directory.
pub const MANIFEST_FILE: &str = "pending.json";

/// Outcome of the startup update check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateDecision {
    /// Startup continues normally.
    NoneAvailable,
    /// The updater has taken over; the shell must exit without building UI.
    AvailablePendingExit,
}

/// Update staged on disk and ready to be applied.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PendingUpdate {
    /// Version the update installs.
    pub version: String,
    /// Executable applying the update.
    pub updater: PathBuf,
    /// Arguments handed to the updater.
    #[serde(default)]
    pub arguments: Vec<String>,
}

/// Errors raised while looking for or launching an update.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// The manifest exists but could not be read.
    #[error("failed to read update manifest '{path}': {source}")]
    Read {
        /// Manifest path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The manifest is not valid JSON for a [`PendingUpdate`].
    #[error("invalid update manifest '{path}': {source}")]
    Parse {
        /// Manifest path.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// The updater could not be started.
    #[error("failed to launch updater '{updater}': {source}")]
    Launch {
        /// Updater executable.
        updater: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Source of staged updates.
pub trait UpdateSource: Send {
    /// Returns the staged update, if any.
    fn pending_update(&self) -> Result<Option<PendingUpdate>, UpdateError>;
}

/// Reads [`MANIFEST_FILE`] from an update directory.
#[derive(Debug, Clone)]
pub struct StagedUpdateSource {
    directory: PathBuf,
}

impl StagedUpdateSource {
    /// Builds a source reading manifests from `directory`.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Path of the manifest this source reads.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.directory.join(MANIFEST_FILE)
    }
}

impl UpdateSource for StagedUpdateSource {
    fn pending_update(&self) -> Result<Option<PendingUpdate>, UpdateError> {
        let path = self.manifest_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(UpdateError::Read { path, source }),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| UpdateError::Parse { path, source })
    }
}

/// Starts the external updater.
pub trait UpdaterLauncher: Send {
    /// Launches the updater for `update`, returning its pid.
    fn launch(&self, update: &PendingUpdate) -> Result<u32, UpdateError>;
}

/// Spawns the updater as a detached child process.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemUpdaterLauncher;

impl UpdaterLauncher for SystemUpdaterLauncher {
    fn launch(&self, update: &PendingUpdate) -> Result<u32, UpdateError> {
        let child = Command::new(&update.updater)
            .args(&update.arguments)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| UpdateError::Launch {
                updater: update.updater.clone(),
                source,
            })?;
        Ok(child.id())
    }
}

/// Decides whether startup yields to the updater.
pub struct UpdateGate {
    source: Box<dyn UpdateSource>,
    launcher: Box<dyn UpdaterLauncher>,
    current_version: String,
}

impl UpdateGate {
    /// Builds a gate comparing staged updates against `current_version`.
    #[must_use]
    pub fn new(
        source: Box<dyn UpdateSource>,
        launcher: Box<dyn UpdaterLauncher>,
        current_version: impl Into<String>,
    ) -> Self {
        Self {
            source,
            launcher,
            current_version: current_version.into(),
        }
    }

    /// Runs the check. Problems with the manifest or the updater never block
    /// startup; they are logged and the shell carries on.
    pub fn check_for_updates(&self) -> UpdateDecision {
        let update = match self.source.pending_update() {
            Ok(Some(update)) => update,
            Ok(None) => {
                debug!(target: UPDATE_TARGET, "no staged update");
                return UpdateDecision::NoneAvailable;
            }
            Err(error) => {
                warn!(
                    target: UPDATE_TARGET,
                    error = %error,
                    "ignoring unusable staged update"
                );
                return UpdateDecision::NoneAvailable;
            }
        };

        if update.version == self.current_version {
            debug!(
                target: UPDATE_TARGET,
                version = %update.version,
                "staged update matches running version"
            );
            return UpdateDecision::NoneAvailable;
        }

        match self.launcher.launch(&update) {
            Ok(pid) => {
                info!(
                    target: UPDATE_TARGET,
                    version = %update.version,
                    updater = %update.updater.display(),
                    pid,
                    "updater launched; exiting to apply update"
                );
                UpdateDecision::AvailablePendingExit
            }
            Err(error) => {
                warn!(
                    target: UPDATE_TARGET,
                    version = %update.version,
                    error = %error,
                    "could not hand over to updater"
                );
                UpdateDecision::NoneAvailable
            }
        }
    }
}

impl std::fmt::Debug for UpdateGate {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("UpdateGate")
            .field("current_version", &self.current_version)
            .finish_non_exhaustive()
    }
}
