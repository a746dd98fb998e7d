//! Home-thread dispatching.
//!
//! [`Dispatcher`] is the only structure in the crate touched by several threads at
//! once. Everything else (registry, subscriber sets) is mutated and delivered only on
//! the home thread the dispatcher was created on.

mod dispatcher;

pub use dispatcher::Dispatcher;
pub(crate) use dispatcher::panic_message;
