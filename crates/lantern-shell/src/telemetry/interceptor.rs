//! Routes `tracing` events (and `log` records, through the bridge) into the
//! pipeline.

use std::fmt::{self, Write as _};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::dispatcher::DefaultGuard;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::registry::Registry;
use tracing_subscriber::util::SubscriberInitExt;

use super::pipeline::LogPipeline;
use super::record::{Severity, SourceLocation};

static GLOBAL_INTERCEPTOR: OnceCell<()> = OnceCell::new();

/// Where the interceptor is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptorScope {
    /// Process-wide subscriber, installed at most once per process.
    Global,
    /// Subscriber for the calling thread until the handle drops.
    Thread,
}

/// Keeps a thread-scoped interceptor registered while alive.
///
/// Global registrations cannot be undone, so their handle holds no guard.
#[derive(Debug)]
pub struct InterceptorHandle {
    _scope: Option<DefaultGuard>,
    already_installed: bool,
}

impl InterceptorHandle {
    /// Whether an earlier global registration kept receiving events instead
    /// of the pipeline passed to this call.
    #[must_use]
    pub fn already_installed(&self) -> bool {
        self.already_installed
    }
}

/// Errors encountered while installing the interceptor.
#[derive(Debug, thiserror::Error)]
pub enum InterceptorError {
    /// Another global subscriber was installed first.
    #[error("failed to install log interceptor: {0}")]
    Install(String),
}

/// Registers `pipeline` as the destination of every `tracing` event.
///
/// Only the first global call registers a subscriber. Later global calls
/// keep the original pipeline and return a handle whose
/// [`InterceptorHandle::already_installed`] is set, so the caller can report
/// that its pipeline is not receiving events.
pub fn install_interceptor(
    pipeline: &Arc<LogPipeline>,
    scope: InterceptorScope,
) -> Result<InterceptorHandle, InterceptorError> {
    match scope {
        InterceptorScope::Global => {
            let mut registered = false;
            GLOBAL_INTERCEPTOR.get_or_try_init(|| {
                registered = true;
                Registry::default()
                    .with(PipelineLayer::new(Arc::clone(pipeline)))
                    .try_init()
                    .map_err(|error| InterceptorError::Install(error.to_string()))
            })?;
            Ok(InterceptorHandle {
                _scope: None,
                already_installed: !registered,
            })
        }
        InterceptorScope::Thread => {
            let subscriber = Registry::default().with(PipelineLayer::new(Arc::clone(pipeline)));
            Ok(InterceptorHandle {
                _scope: Some(tracing::subscriber::set_default(subscriber)),
                already_installed: false,
            })
        }
    }
}

/// Layer forwarding events to a [`LogPipeline`].
///
/// Level filtering happens inside the pipeline rather than through
/// `Layer::enabled`, because callsite interest is cached and would ignore
/// later level changes.
pub struct PipelineLayer {
    pipeline: Arc<LogPipeline>,
}

impl PipelineLayer {
    /// Builds a layer feeding `pipeline`.
    #[must_use]
    pub fn new(pipeline: Arc<LogPipeline>) -> Self {
        Self { pipeline }
    }
}

impl<S: Subscriber> Layer<S> for PipelineLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let severity = Severity::from(*metadata.level());
        if !self.pipeline.enabled(severity) {
            return;
        }

        let mut visitor = EventText::default();
        event.record(&mut visitor);
        let location = metadata
            .file()
            .zip(metadata.line())
            .map(|(file, line)| SourceLocation::new(file, line));
        self.pipeline
            .log_at(severity, &visitor.finish(metadata.target()), location);
    }
}

#[derive(Default)]
struct EventText {
    message: String,
    fields: String,
}

impl EventText {
    fn finish(self, target: &str) -> String {
        format!("{target}: {}{}", self.message, self.fields)
    }
}

impl Visit for EventText {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={value}", field.name());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={value:?}", field.name());
        }
    }
}
