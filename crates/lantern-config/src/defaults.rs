//! Built-in defaults applied when a setting is absent.

use camino::Utf8PathBuf;
use std::env;

use dirs::data_local_dir;

use crate::LogLevel;

/// Application identity used for directories and file names.
pub const APP_NAME: &str = "lantern";

/// Initial pipeline level until the configured level is applied.
pub const DEFAULT_LOG_LEVEL: LogLevel = LogLevel::Debug;

/// Size threshold for log rotation (1 MiB).
pub const DEFAULT_LOG_MAX_BYTES: u64 = 1024 * 1024;

/// Rotated log files kept alongside the active file.
pub const DEFAULT_LOG_MAX_FILES: usize = 9;

/// Bounded wait for an existing instance to answer an activation request.
pub const DEFAULT_ACTIVATION_TIMEOUT_MS: u64 = 2000;

/// Default log directory: `<local data dir>/lantern/logs`.
#[must_use]
pub fn default_log_dir() -> Utf8PathBuf {
    data_subdirectory("logs")
}

/// Default crash dump directory: `<local data dir>/lantern/crashes`.
#[must_use]
pub fn default_crash_dir() -> Utf8PathBuf {
    data_subdirectory("crashes")
}

/// Default staged update directory: `<local data dir>/lantern/updates`.
#[must_use]
pub fn default_update_dir() -> Utf8PathBuf {
    data_subdirectory("updates")
}

fn data_subdirectory(leaf: &str) -> Utf8PathBuf {
    let mut base = data_base_directory();
    base.push(APP_NAME);
    base.push(leaf);
    base
}

fn data_base_directory() -> Utf8PathBuf {
    data_local_dir()
        .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
        .unwrap_or_else(fallback_base_directory)
}

fn fallback_base_directory() -> Utf8PathBuf {
    let candidate = env::temp_dir();
    Utf8PathBuf::from_path_buf(candidate).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}
