//! Single-instance guard and the activation channel between launches.
//!
//! The first launch in a session takes the lock in the runtime directory and
//! serves a Unix socket next to it. Later launches forward their arguments
//! over that socket and exit. Ownership is a kernel advisory lock, so files
//! left behind by a crashed owner are taken over by the next launch.

mod activation;
mod errors;
mod guard;
mod listener;
mod lock;

pub use activation::{ActivationOutcome, ActivationRequest, ActivationSink, send_activation};
pub use errors::{InstanceError, ListenerError};
pub use guard::{Acquisition, InstanceGuard};
pub use listener::{ActivationListener, ActivationListenerHandle};
pub use lock::InstanceLock;

pub(crate) const INSTANCE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::instance");
