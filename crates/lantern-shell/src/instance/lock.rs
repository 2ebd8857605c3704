//! Lock and pid files backing the instance guard.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::Path;

use lantern_config::{APP_NAME, RuntimePaths};
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use tempfile::Builder;
use tracing::{debug, info, warn};

use super::INSTANCE_TARGET;
use super::errors::InstanceError;

const LOCK_ATTEMPTS: usize = 3;

/// Ownership of the per-session instance lock.
///
/// Ownership is an exclusive `flock` held on the lock file for the lifetime
/// of this value, so the kernel releases it when the owner exits or crashes.
/// The owner's pid is recorded next to it for diagnostics. Both files are
/// unlinked on drop before the lock is released.
#[derive(Debug)]
pub struct InstanceLock {
    paths: RuntimePaths,
    _lock: Flock<File>,
}

impl InstanceLock {
    /// Attempts to take the lock.
    ///
    /// Returns `Ok(None)` when another live process holds it. Files left by
    /// an owner that died are simply locked again.
    pub fn try_acquire(paths: &RuntimePaths) -> Result<Option<Self>, InstanceError> {
        for _ in 0..LOCK_ATTEMPTS {
            let file = open_lock_file(paths.lock_path())?;
            let locked = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
                Ok(locked) => locked,
                Err((_, Errno::EWOULDBLOCK)) => return Ok(None),
                Err((_, source)) => {
                    return Err(InstanceError::Lock {
                        path: paths.lock_path().to_path_buf(),
                        source,
                    });
                }
            };
            // The previous owner unlinks the file before unlocking it; a lock
            // taken on that orphaned inode guards nothing.
            if !is_linked(paths.lock_path(), &locked)? {
                debug!(
                    target: INSTANCE_TARGET,
                    file = %paths.lock_path().display(),
                    "locked a lock file that was replaced; retrying"
                );
                continue;
            }
            return Self::claimed(paths, locked).map(Some);
        }
        Ok(None)
    }

    fn claimed(paths: &RuntimePaths, locked: Flock<File>) -> Result<Self, InstanceError> {
        let lock = Self {
            paths: paths.clone(),
            _lock: locked,
        };
        let pid = std::process::id();
        atomic_write(paths.pid_path(), format!("{pid}\n").as_bytes()).map_err(|source| {
            InstanceError::PidWrite {
                path: paths.pid_path().to_path_buf(),
                source,
            }
        })?;
        info!(
            target: INSTANCE_TARGET,
            pid,
            file = %paths.lock_path().display(),
            "acquired instance lock"
        );
        Ok(lock)
    }

    /// Runtime layout the lock lives in.
    #[must_use]
    pub fn paths(&self) -> &RuntimePaths {
        &self.paths
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        // Runs before the `flock` field is released.
        for path in [self.paths.pid_path(), self.paths.lock_path()] {
            if let Err(error) = fs::remove_file(path)
                && error.kind() != io::ErrorKind::NotFound
            {
                warn!(
                    target: INSTANCE_TARGET,
                    file = %path.display(),
                    error = %error,
                    "failed to remove instance file"
                );
            }
        }
    }
}

/// Reads the pid recorded by the current owner, if any.
pub(super) fn read_pid(path: &Path) -> Option<u32> {
    let content = fs::read_to_string(path).ok()?;
    content.trim().parse::<u32>().ok().filter(|pid| *pid != 0)
}

fn open_lock_file(path: &Path) -> Result<File, InstanceError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .mode(0o600)
        .open(path)
        .map_err(|source| InstanceError::LockCreate {
            path: path.to_path_buf(),
            source,
        })
}

fn is_linked(path: &Path, file: &File) -> Result<bool, InstanceError> {
    let held = file.metadata().map_err(|source| InstanceError::LockCreate {
        path: path.to_path_buf(),
        source,
    })?;
    match fs::metadata(path) {
        Ok(current) => Ok(current.dev() == held.dev() && current.ino() == held.ino()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(InstanceError::LockCreate {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `contents` through a temporary file renamed into place, so a
/// secondary process never reads a half-written pid.
fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let directory = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            "target path did not have a parent directory",
        )
    })?;

    let mut builder = Builder::new();
    builder
        .prefix(
            path.file_name()
                .and_then(|name| name.to_str())
                .unwrap_or(APP_NAME),
        )
        .permissions(fs::Permissions::from_mode(0o600));

    let mut file = builder.tempfile_in(directory)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|error| error.error)?;
    Ok(())
}
