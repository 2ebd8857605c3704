use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Log severity threshold accepted by the `log_level` setting.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogLevel {
    /// Everything, including per-frame chatter.
    Trace,
    /// Diagnostic detail; the shell's initial level.
    #[default]
    Debug,
    /// Lifecycle milestones.
    Info,
    /// Recoverable problems.
    Warn,
    /// Failures that abort an operation.
    Error,
    /// Failures that abort the process.
    Fatal,
    /// Turns logging off entirely.
    Disable,
}

/// Errors encountered while parsing a [`LogLevel`] from text.
pub type LogLevelParseError = strum::ParseError;
