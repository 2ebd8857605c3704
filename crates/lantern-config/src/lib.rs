//! Shared configuration for the Lantern desktop shell.
//!
//! Settings are layered by [`ortho_config`]: command-line flags take
//! precedence over `LANTERN_*` environment variables, which take precedence
//! over `lantern.toml` configuration files, which override the built-in
//! defaults documented in [`defaults`]. Values that the shell must interpret
//! leniently (the log level and the render backend preference) are stored as
//! raw strings and resolved through [`Setting`], so an invalid value degrades
//! to a documented default rather than aborting startup.

use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

pub mod defaults;
mod logging;
mod render;
mod runtime;
mod setting;

pub use defaults::{
    APP_NAME, DEFAULT_ACTIVATION_TIMEOUT_MS, DEFAULT_LOG_LEVEL, DEFAULT_LOG_MAX_BYTES,
    DEFAULT_LOG_MAX_FILES, default_crash_dir, default_log_dir, default_update_dir,
};
pub use logging::{LogLevel, LogLevelParseError};
pub use render::{RenderBackend, RenderBackendParseError};
pub use runtime::{RuntimePaths, RuntimePathsError};
pub use setting::Setting;

/// Configuration flags understood by the loader.
///
/// The shell splits these out of the raw argument list before handing the
/// remainder to dependent subsystems, so this list must stay in sync with the
/// fields of [`Config`].
pub const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--log-dir",
    "--log-level",
    "--log-max-bytes",
    "--log-max-files",
    "--runtime-dir",
    "--crash-dir",
    "--update-dir",
    "--render-backend",
    "--remote-inspector",
    "--skip-update-check",
    "--activation-timeout-ms",
    "--helper-socket",
];

/// Flags in [`CONFIG_CLI_FLAGS`] that are switches and never take a value.
pub const CONFIG_CLI_SWITCHES: &[&str] = &["--remote-inspector", "--skip-update-check"];

/// Layered configuration consumed by the shell bootstrap.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, OrthoConfig)]
#[ortho_config(prefix = "LANTERN")]
pub struct Config {
    /// Directory receiving the active and rotated log files.
    pub log_dir: Option<Utf8PathBuf>,
    /// Requested log severity (`trace` .. `fatal`, or `disable`).
    pub log_level: Option<String>,
    /// Size in bytes above which the active log file is rotated.
    #[ortho_config(default = 1_048_576)]
    pub log_max_bytes: u64,
    /// Number of rotated log files retained on disk.
    #[ortho_config(default = 9)]
    pub log_max_files: usize,
    /// Directory holding the instance lock, pid file and activation socket.
    pub runtime_dir: Option<Utf8PathBuf>,
    /// Directory receiving crash dumps.
    pub crash_dir: Option<Utf8PathBuf>,
    /// Directory inspected for staged updates.
    pub update_dir: Option<Utf8PathBuf>,
    /// Render backend preference applied before the graphics runtime starts.
    pub render_backend: Option<String>,
    /// Opens the embedded web runtime's remote debugging channel.
    #[ortho_config(default = false)]
    pub remote_inspector: bool,
    /// Bypasses the startup update check.
    #[ortho_config(default = false)]
    pub skip_update_check: bool,
    /// Milliseconds to wait for a running instance to answer an activation request.
    #[ortho_config(default = 2000)]
    pub activation_timeout_ms: u64,
    /// Unix socket of the helper process, when one is deployed.
    pub helper_socket: Option<Utf8PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_dir: None,
            log_level: None,
            log_max_bytes: DEFAULT_LOG_MAX_BYTES,
            log_max_files: DEFAULT_LOG_MAX_FILES,
            runtime_dir: None,
            crash_dir: None,
            update_dir: None,
            render_backend: None,
            remote_inspector: false,
            skip_update_check: false,
            activation_timeout_ms: DEFAULT_ACTIVATION_TIMEOUT_MS,
            helper_socket: None,
        }
    }
}

impl Config {
    /// Directory receiving log files, falling back to the platform data dir.
    #[must_use]
    pub fn log_dir(&self) -> Utf8PathBuf {
        self.log_dir.clone().unwrap_or_else(default_log_dir)
    }

    /// Directory receiving crash dumps.
    #[must_use]
    pub fn crash_dir(&self) -> Utf8PathBuf {
        self.crash_dir.clone().unwrap_or_else(default_crash_dir)
    }

    /// Directory inspected for staged updates.
    #[must_use]
    pub fn update_dir(&self) -> Utf8PathBuf {
        self.update_dir.clone().unwrap_or_else(default_update_dir)
    }

    /// Resolves the configured log level.
    ///
    /// Unknown values resolve to [`DEFAULT_LOG_LEVEL`] and are reported as
    /// [`Setting::Invalid`] so the caller can warn about them.
    #[must_use]
    pub fn log_level(&self) -> Setting<LogLevel> {
        Setting::resolve(self.log_level.as_deref(), DEFAULT_LOG_LEVEL)
    }

    /// Resolves the configured render backend preference.
    #[must_use]
    pub fn render_backend(&self) -> Setting<RenderBackend> {
        Setting::resolve(self.render_backend.as_deref(), RenderBackend::default())
    }

    /// Bounded wait used when probing an existing instance.
    #[must_use]
    pub const fn activation_timeout(&self) -> Duration {
        Duration::from_millis(self.activation_timeout_ms)
    }
}

/// Result type produced by configuration loading.
pub type ConfigResult = Result<Config, Arc<OrthoError>>;
