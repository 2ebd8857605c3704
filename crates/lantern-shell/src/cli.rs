//! Command-line handling ahead of heavy initialisation.
//!
//! The shell understands two flags of its own and the configuration flags of
//! [`lantern_config`]. Everything else, and everything after `--`, belongs to
//! the dependent subsystems and is passed through untouched.

use std::ffi::{OsStr, OsString};

use clap::Parser;
use lantern_config::{APP_NAME, CONFIG_CLI_FLAGS, CONFIG_CLI_SWITCHES};
use thiserror::Error;

const SHELL_FLAGS: &[&str] = &["--licenses", "--hidden"];
const END_OF_OPTIONS: &str = "--";

/// Flags owned by the shell itself.
#[derive(Parser, Debug)]
#[command(name = APP_NAME, disable_help_flag = true, disable_version_flag = true)]
struct ShellCli {
    /// Prints the bundled third-party licenses and exits.
    #[arg(long)]
    licenses: bool,
    /// Runs the full bootstrap without building the interface.
    #[arg(long)]
    hidden: bool,
}

/// Errors raised while interpreting the shell's own flags.
#[derive(Debug, Error)]
pub enum CliError {
    /// The shell flags were rejected.
    #[error("invalid shell arguments: {0}")]
    Usage(#[from] clap::Error),
}

/// Arguments split by consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Program name the process was started with.
    pub program: OsString,
    /// `--licenses` was given.
    pub show_licenses: bool,
    /// `--hidden` was given.
    pub start_hidden: bool,
    /// Every argument after the program name, as received.
    pub raw_arguments: Vec<OsString>,
    /// Configuration flags and their values.
    pub config_arguments: Vec<OsString>,
    /// Arguments for dependent subsystems.
    pub passthrough: Vec<OsString>,
}

enum ArgumentKind {
    Shell,
    ConfigWithValue,
    ConfigComplete,
    EndOfOptions,
    Passthrough,
}

impl LaunchOptions {
    /// Splits `args`, whose first element is the program name.
    pub fn parse<I, T>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let mut args = args.into_iter().map(Into::into);
        let program = args.next().unwrap_or_else(|| OsString::from(APP_NAME));
        let raw_arguments: Vec<OsString> = args.collect();

        let mut shell_flags: Vec<OsString> = Vec::new();
        let mut config_arguments = Vec::new();
        let mut passthrough = Vec::new();
        let mut remaining = raw_arguments.iter().cloned();
        while let Some(argument) = remaining.next() {
            match classify(&argument) {
                ArgumentKind::Shell => {
                    if !shell_flags.contains(&argument) {
                        shell_flags.push(argument);
                    }
                }
                ArgumentKind::ConfigWithValue => {
                    config_arguments.push(argument);
                    config_arguments.extend(remaining.next());
                }
                ArgumentKind::ConfigComplete => config_arguments.push(argument),
                ArgumentKind::EndOfOptions => {
                    passthrough.extend(remaining.by_ref());
                }
                ArgumentKind::Passthrough => passthrough.push(argument),
            }
        }

        let cli = ShellCli::try_parse_from(std::iter::once(program.clone()).chain(shell_flags))?;
        Ok(Self {
            program,
            show_licenses: cli.licenses,
            start_hidden: cli.hidden,
            raw_arguments,
            config_arguments,
            passthrough,
        })
    }

    /// Argument list for the configuration loader, program name first.
    #[must_use]
    pub fn loader_arguments(&self) -> Vec<OsString> {
        std::iter::once(self.program.clone())
            .chain(self.config_arguments.iter().cloned())
            .collect()
    }
}

fn classify(argument: &OsStr) -> ArgumentKind {
    let Some(text) = argument.to_str() else {
        return ArgumentKind::Passthrough;
    };
    if text == END_OF_OPTIONS {
        return ArgumentKind::EndOfOptions;
    }
    if SHELL_FLAGS.contains(&text) {
        return ArgumentKind::Shell;
    }
    let (flag, inline_value) = match text.split_once('=') {
        Some((flag, _)) => (flag, true),
        None => (text, false),
    };
    if !CONFIG_CLI_FLAGS.contains(&flag) {
        return ArgumentKind::Passthrough;
    }
    if inline_value || CONFIG_CLI_SWITCHES.contains(&flag) {
        ArgumentKind::ConfigComplete
    } else {
        ArgumentKind::ConfigWithValue
    }
}
