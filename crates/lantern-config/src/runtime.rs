//! Derives the per-session runtime artefact paths.
//!
//! The runtime directory houses the instance lock, the pid file and the
//! activation socket. A primary and a secondary process must agree on this
//! layout so the secondary can find the primary's activation channel.

use std::env;
use std::fs::DirBuilder;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::{APP_NAME, Config};

#[cfg(unix)]
use dirs::runtime_dir;
#[cfg(unix)]
use libc::geteuid;

/// Canonical paths for the artefacts backing the instance lock.
#[derive(Debug, Clone)]
pub struct RuntimePaths {
    runtime_dir: PathBuf,
    lock_path: PathBuf,
    pid_path: PathBuf,
    socket_path: PathBuf,
}

impl RuntimePaths {
    /// Derives runtime paths from the shared configuration, creating the
    /// directory with owner-only permissions when it is missing.
    pub fn from_config(config: &Config) -> Result<Self, RuntimePathsError> {
        let runtime_dir = config
            .runtime_dir
            .as_ref()
            .map_or_else(default_runtime_directory, |dir| {
                dir.as_std_path().to_path_buf()
            });
        Self::in_directory(runtime_dir)
    }

    /// Builds the layout inside an explicit directory.
    pub fn in_directory(runtime_dir: PathBuf) -> Result<Self, RuntimePathsError> {
        prepare_directory(&runtime_dir).map_err(|source| RuntimePathsError::RuntimeDirectory {
            path: runtime_dir.clone(),
            source,
        })?;
        Ok(Self {
            lock_path: runtime_dir.join(format!("{APP_NAME}.lock")),
            pid_path: runtime_dir.join(format!("{APP_NAME}.pid")),
            socket_path: runtime_dir.join(format!("{APP_NAME}.sock")),
            runtime_dir,
        })
    }

    /// Directory holding runtime artefacts.
    #[must_use]
    pub fn runtime_dir(&self) -> &Path {
        self.runtime_dir.as_path()
    }

    /// Path to the lock file guarding single-instance startup.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        self.lock_path.as_path()
    }

    /// Path to the PID file.
    #[must_use]
    pub fn pid_path(&self) -> &Path {
        self.pid_path.as_path()
    }

    /// Path to the activation socket.
    #[must_use]
    pub fn socket_path(&self) -> &Path {
        self.socket_path.as_path()
    }
}

fn prepare_directory(path: &Path) -> io::Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    match builder.create(path) {
        Err(error) if error.kind() != io::ErrorKind::AlreadyExists => Err(error),
        _ => Ok(()),
    }
}

fn default_runtime_directory() -> PathBuf {
    #[cfg(unix)]
    {
        if let Some(mut dir) = runtime_dir() {
            dir.push(APP_NAME);
            return dir;
        }
        let mut dir = env::temp_dir();
        dir.push(APP_NAME);
        dir.push(format!("uid-{}", unsafe { geteuid() }));
        dir
    }

    #[cfg(not(unix))]
    {
        let mut dir = env::temp_dir();
        dir.push(APP_NAME);
        dir
    }
}

/// Errors raised while deriving runtime paths.
#[derive(Debug, Error)]
pub enum RuntimePathsError {
    /// Creating the runtime directory failed.
    #[error("failed to prepare runtime directory '{path}': {source}")]
    RuntimeDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}
