//! Test harness utilities for the shell bootstrap suites.

mod doubles;
mod reporter;
mod world;

pub use doubles::{Journal, RecordingLauncher, RecordingSurface, scripted_component};
pub use reporter::{LifecycleEvent, RecordingLifecycleReporter};
pub use world::{TestWorld, world};
