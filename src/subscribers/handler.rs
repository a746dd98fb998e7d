//! # Typed handles for callbacks and predicates
//!
//! [`Callback`] and [`Predicate`] are the typed front door to
//! [`WeakCallback`]: they fix the payload type `T` (and state type `S`) at
//! compile time, so the messenger API cannot register a callable under the wrong
//! payload type.
//!
//! Both are identified by function address + receiver address. Building the same
//! handle twice (same function, same receiver) yields the same [`CallbackId`],
//! which is how `unsubscribe` finds a registration again:
//!
//! ```rust
//! use std::sync::Arc;
//! use weakbus::Callback;
//!
//! struct Chat;
//! impl Chat {
//!     fn on_message(&self, _msg: &String) {}
//! }
//!
//! let chat = Arc::new(Chat);
//! let a = Callback::bound(&chat, Chat::on_message);
//! let b = Callback::bound(&chat, Chat::on_message);
//! assert_eq!(a.id(), b.id());
//! ```

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::payload::Payload;
use crate::weak::{CallbackId, WeakCallback};

/// Observer for payloads of type `T`, optionally receiving a state object `S`.
pub struct Callback<T, S = ()> {
    inner: WeakCallback<()>,
    _marker: PhantomData<fn(&T, &S)>,
}

impl<T: Payload> Callback<T> {
    /// Receiver-less callback.
    pub fn new(f: fn(&T)) -> Self {
        Self::wrap(WeakCallback::from_fn(f))
    }

    /// Method bound to `receiver`; the subscription does not keep `receiver` alive.
    pub fn bound<O: Any + Send + Sync>(receiver: &Arc<O>, method: fn(&O, &T)) -> Self {
        Self::wrap(WeakCallback::bind(receiver, method))
    }
}

impl<T: Payload, S: Payload> Callback<T, S> {
    /// Receiver-less callback taking the subscription's state object.
    pub fn with_state(f: fn(&T, &S)) -> Self {
        Self::wrap(WeakCallback::from_fn_with_state(f))
    }

    /// Bound method taking the subscription's state object.
    pub fn bound_with_state<O: Any + Send + Sync>(
        receiver: &Arc<O>,
        method: fn(&O, &T, &S),
    ) -> Self {
        Self::wrap(WeakCallback::bind_with_state(receiver, method))
    }
}

impl<T, S> Callback<T, S> {
    fn wrap(inner: WeakCallback<()>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Registration identity.
    pub fn id(&self) -> CallbackId {
        self.inner.id()
    }

    /// False once a bound receiver was dropped.
    pub fn is_alive(&self) -> bool {
        self.inner.is_alive()
    }

    pub(crate) fn into_inner(self) -> WeakCallback<()> {
        self.inner
    }
}

impl<T, S> fmt::Debug for Callback<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Callback").field(&self.inner).finish()
    }
}

/// Filter for payloads of type `T`, optionally receiving a state object `S`.
///
/// Used either next to a [`Callback`] (per-subscription filter) or alone, as a
/// type-wide gate that can veto delivery to every callback of `T`.
pub struct Predicate<T, S = ()> {
    inner: WeakCallback<bool>,
    _marker: PhantomData<fn(&T, &S) -> bool>,
}

impl<T: Payload> Predicate<T> {
    /// Receiver-less predicate.
    pub fn new(f: fn(&T) -> bool) -> Self {
        Self::wrap(WeakCallback::from_fn(f))
    }

    /// Predicate method bound to `receiver`.
    pub fn bound<O: Any + Send + Sync>(receiver: &Arc<O>, method: fn(&O, &T) -> bool) -> Self {
        Self::wrap(WeakCallback::bind(receiver, method))
    }
}

impl<T: Payload, S: Payload> Predicate<T, S> {
    /// Receiver-less predicate taking the subscription's state object.
    pub fn with_state(f: fn(&T, &S) -> bool) -> Self {
        Self::wrap(WeakCallback::from_fn_with_state(f))
    }

    /// Bound predicate taking the subscription's state object.
    pub fn bound_with_state<O: Any + Send + Sync>(
        receiver: &Arc<O>,
        method: fn(&O, &T, &S) -> bool,
    ) -> Self {
        Self::wrap(WeakCallback::bind_with_state(receiver, method))
    }
}

impl<T, S> Predicate<T, S> {
    fn wrap(inner: WeakCallback<bool>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Registration identity.
    pub fn id(&self) -> CallbackId {
        self.inner.id()
    }

    /// False once a bound receiver was dropped.
    pub fn is_alive(&self) -> bool {
        self.inner.is_alive()
    }

    pub(crate) fn into_inner(self) -> WeakCallback<bool> {
        self.inner
    }
}

impl<T, S> fmt::Debug for Predicate<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.inner).finish()
    }
}
