//! Weak references to subscribers.
//!
//! - [`WeakHolder`] observes an `Arc`-managed object without owning it.
//! - [`WeakCallback`] is a function pointer plus an optional weakly-held receiver;
//!   it is what every subscription stores for its callback and predicate.

mod callback;
mod holder;

pub use callback::{CallbackId, Invocation, Signature, WeakCallback};
pub use holder::WeakHolder;
