//! # WeakHolder: non-owning handle with explicit liveness.
//!
//! Wraps a [`Weak`] pointer to a target that lives in an [`Arc`]. The holder never
//! extends the target's lifetime; once the last strong reference is dropped the
//! holder reports itself dead.
//!
//! ## Rules
//! - `is_alive()` = reference still held **and** the referent not yet dropped.
//! - `dispose()` forgets the reference eagerly (idempotent), without waiting for
//!   the owner to drop the target.
//! - `upgrade()` is the only way to reach the target and yields a temporary strong
//!   handle for the duration of one call.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Non-owning reference to an `Arc`-managed target.
pub struct WeakHolder<T: ?Sized> {
    target: Mutex<Option<Weak<T>>>,
}

impl<T: ?Sized> WeakHolder<T> {
    /// Creates a holder observing `target`.
    pub fn new(target: &Arc<T>) -> Self {
        Self {
            target: Mutex::new(Some(Arc::downgrade(target))),
        }
    }

    /// True while the target exists and the holder was not disposed.
    pub fn is_alive(&self) -> bool {
        self.target
            .lock()
            .as_ref()
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Resolves the target into a temporary strong handle.
    ///
    /// Returns `None` once the target was dropped or the holder disposed.
    pub fn upgrade(&self) -> Option<Arc<T>> {
        self.target.lock().as_ref().and_then(Weak::upgrade)
    }

    /// Forgets the target. Safe to call any number of times.
    pub fn dispose(&self) {
        self.target.lock().take();
    }

    /// True once [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.target.lock().is_none()
    }
}

impl<T: ?Sized> std::fmt::Debug for WeakHolder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakHolder")
            .field("alive", &self.is_alive())
            .finish()
    }
}
