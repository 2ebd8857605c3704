//! Logging pipeline: rotating file output, token redaction and the `tracing`
//! interceptor that feeds it.

mod destination;
mod interceptor;
mod pipeline;
mod record;
mod redaction;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use lantern_config::{APP_NAME, Config};

pub use destination::{LogDestination, RotatingFileDestination, RotationPolicy};
pub use interceptor::{
    InterceptorError, InterceptorHandle, InterceptorScope, PipelineLayer, install_interceptor,
};
pub use pipeline::LogPipeline;
pub use record::{LogRecord, Severity, SourceLocation};
pub use redaction::{MASK_CHARACTER, RedactionRule, TOKEN_MARKERS, TOKEN_MASK_LENGTH, redact};

pub(crate) const TELEMETRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::telemetry");

/// File name of the active log file inside the log directory.
#[must_use]
pub fn log_file_name() -> String {
    format!("{APP_NAME}.log")
}

/// Builds the shell's pipeline with a rotating file destination in the
/// configured log directory.
///
/// A destination that cannot be opened is reported once on stderr and the
/// pipeline runs without it; logging problems never stop the shell.
#[must_use]
pub fn open_pipeline(config: &Config) -> Arc<LogPipeline> {
    let pipeline = Arc::new(LogPipeline::with_token_redaction());
    let path = config.log_dir().into_std_path_buf().join(log_file_name());
    let policy = RotationPolicy {
        max_bytes: config.log_max_bytes,
        max_files: config.log_max_files,
        rotate_on_open: true,
    };
    match RotatingFileDestination::open(&path, policy) {
        Ok(destination) => pipeline.append(Box::new(destination)),
        Err(error) => pipeline.report_once(&format!(
            "failed to open log file {}: {error}",
            path.display()
        )),
    }
    pipeline
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use std::fs;

    #[test]
    fn pipeline_writes_into_the_configured_directory() {
        let dir = tempfile::tempdir().expect("temp dir");
        let log_dir = Utf8PathBuf::from_path_buf(dir.path().join("logs")).expect("utf8 path");
        let config = Config {
            log_dir: Some(log_dir.clone()),
            ..Config::default()
        };

        let pipeline = open_pipeline(&config);
        pipeline.log(Severity::Info, "hello");
        pipeline.flush();

        let content =
            fs::read_to_string(log_dir.join("lantern.log")).expect("log file should exist");
        assert!(content.ends_with("[INFO] hello\n"), "{content}");
    }

    #[test]
    fn an_unwritable_directory_degrades_to_no_destination() {
        let dir = tempfile::tempdir().expect("temp dir");
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"").expect("write blocker");
        let config = Config {
            log_dir: Some(Utf8PathBuf::from_path_buf(blocker.join("logs")).expect("utf8 path")),
            ..Config::default()
        };

        let pipeline = open_pipeline(&config);
        pipeline.log(Severity::Error, "goes nowhere");

        assert_eq!(pipeline.failed_writes(), 0);
    }
}
