//! Components initialised once the shell knows it will run.
//!
//! Components are registered as factories so that nothing is constructed
//! when startup stops early, for example when an update takes over. The
//! registry initialises them in registration order and shuts them down in
//! reverse.

mod helper;
mod web_runtime;

use std::ffi::OsString;

use lantern_config::{Config, RenderBackend};
use thiserror::Error;
use tracing::{debug, info};

use crate::platform::Platform;

pub use helper::HelperLink;
pub use web_runtime::{REMOTE_INSPECTOR_ADDRESS, RuntimeLaunch, WebRuntime};

const COMPONENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::components");

/// Everything a component may read while initialising.
#[derive(Clone, Copy)]
pub struct ComponentContext<'a> {
    /// Resolved configuration.
    pub config: &'a Config,
    /// Platform selected at startup.
    pub platform: &'a dyn Platform,
    /// Pass-through arguments, platform switches included.
    pub arguments: &'a [OsString],
    /// Frozen render backend.
    pub render_backend: RenderBackend,
}

/// Failure raised by a component. Displays as the message alone, which is
/// what the fallback surface shows.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ComponentError {
    component: &'static str,
    message: String,
}

impl ComponentError {
    /// Builds an error raised by `component`.
    pub fn new(component: &'static str, message: impl Into<String>) -> Self {
        Self {
            component,
            message: message.into(),
        }
    }

    /// Name of the failing component.
    #[must_use]
    pub fn component(&self) -> &'static str {
        self.component
    }
}

/// A dependent subsystem with an initialise/shutdown lifecycle.
pub trait Component: Send {
    /// Stable identifier used in logs.
    fn name(&self) -> &'static str;

    /// Prepares the component.
    fn initialize(&mut self, context: &ComponentContext<'_>) -> Result<(), ComponentError>;

    /// Releases whatever `initialize` acquired.
    fn shutdown(&mut self);
}

/// Deferred constructor for a [`Component`].
pub type ComponentFactory = Box<dyn FnOnce() -> Box<dyn Component> + Send>;

/// Factories for the components the shell ships with.
#[must_use]
pub fn builtin_components() -> Vec<ComponentFactory> {
    vec![
        Box::new(|| Box::new(WebRuntime::new())),
        Box::new(|| Box::new(HelperLink::new())),
    ]
}

/// Initialised components, in initialisation order.
#[derive(Default)]
pub struct ComponentRegistry {
    initialized: Vec<Box<dyn Component>>,
}

impl ComponentRegistry {
    /// Builds an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs and initialises each component in order.
    ///
    /// On failure the components initialised so far are shut down again
    /// before the error is returned.
    pub fn initialize_all(
        &mut self,
        factories: Vec<ComponentFactory>,
        context: &ComponentContext<'_>,
    ) -> Result<(), ComponentError> {
        for factory in factories {
            let mut component = factory();
            debug!(
                target: COMPONENT_TARGET,
                component = component.name(),
                "initialising component"
            );
            if let Err(error) = component.initialize(context) {
                self.shutdown_all();
                return Err(error);
            }
            info!(
                target: COMPONENT_TARGET,
                component = component.name(),
                "component ready"
            );
            self.initialized.push(component);
        }
        Ok(())
    }

    /// Shuts every component down, newest first.
    pub fn shutdown_all(&mut self) {
        while let Some(mut component) = self.initialized.pop() {
            debug!(
                target: COMPONENT_TARGET,
                component = component.name(),
                "shutting down component"
            );
            component.shutdown();
        }
    }

    /// Names of the initialised components.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.initialized.iter().map(|component| component.name()).collect()
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ComponentRegistry")
            .field("initialized", &self.names())
            .finish()
    }
}
