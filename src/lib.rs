//! Timing control, iteration combinators and typed errors on top of a
//! minimal promise primitive.
//!
//! The typed helpers are plain async functions and [`Promise`] methods:
//!
//! ```
//! use promise_helpers::{map, MapOptions, Promise, Value};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), promise_helpers::Error> {
//! let doubled = map(
//!     vec![Value::from(1), Promise::resolve(2).into(), Value::from(3)],
//!     |n, _, _| async move { Ok(Value::from(n.as_f64().unwrap_or(0.0) * 2.0)) },
//!     MapOptions::default(),
//! )
//! .await?;
//! assert_eq!(doubled, vec![Value::from(2), Value::from(4), Value::from(6)]);
//! # Ok(())
//! # }
//! ```
//!
//! The same operations are available as named [capabilities](capability)
//! that can be installed onto a [`Target`] and called with dynamic
//! arguments.

pub mod capability;
mod error;
pub mod iter;
pub mod options;
pub mod pair;
mod promise;
pub mod timing;
pub mod util;
mod value;

pub use capability::{Args, Capability, CapabilityBuilder, Installer, Registry, Target};
pub use error::{Error, ErrorKind};
pub use iter::{
    find, for_each, map, reduce, sequence, sequence_all_settled, some, waterfall, Settlement, Step,
};
pub use options::{MapOptions, PollOptions, RetryOptions, SerialOptions, Timers};
pub use promise::Promise;
pub use timing::{at_least, attach_timers, delay, timeout, timeout_default};
pub use util::{get, keys, resolve_promise, tap, wait_for_key, wait_for_result};
pub use value::{Function, Object, Value};

/// Installs every registered capability onto `target`. Members already
/// present are left alone.
pub fn install(target: &Target) -> Result<(), Error> {
    Registry::global().install_all(target, false)
}

/// [`install`] onto the process-wide [`Target::ambient`].
pub fn install_ambient() -> Result<&'static Target, Error> {
    let target = Target::ambient();
    install(target)?;
    Ok(target)
}

/// Adds a capability to the global registry. It takes part in later
/// installs, dependencies included.
pub fn register_capability(capability: Capability) -> Option<Capability> {
    Registry::global().register(capability)
}

/// Installers of every capability in the global registry, by name.
pub fn capabilities() -> Vec<Installer<'static>> {
    Registry::global().installers()
}

/// Every error kind with its stable name.
pub fn errors() -> Vec<(&'static str, ErrorKind)> {
    ErrorKind::ALL.into_iter().map(|kind| (kind.name(), kind)).collect()
}
