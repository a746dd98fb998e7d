//! # Two-pass fan-out to every subscriber of one payload type.
//!
//! Provides [`SubscriberSet`]: the ordered list of subscribers registered for a
//! single payload type, and the publish algorithm over it.
//!
//! ## Architecture
//! ```text
//! publish(payload)
//!     │
//!     ├─ pass 1: gates (predicate-only), in insertion order
//!     │     ├─► gate 1 ──► Accepted
//!     │     └─► gate 2 ──► Rejected ──► stop, nothing delivered
//!     │
//!     └─ pass 2: callbacks, in insertion order
//!           ├─► callback 1 (its own predicate first)
//!           └─► callback N
//! ```
//!
//! ## Rules
//! - **Snapshot**: both passes iterate a snapshot taken when publishing starts.
//! - **Frozen while publishing**: `add`/`remove` are refused while a publish is in
//!   flight; the registry buffers those changes and applies them afterwards.
//! - **Veto**: one gate returning `false` aborts the publish before any callback.
//! - **Isolation**: a panicking or failing subscriber is logged and skipped; it
//!   neither vetoes nor stops delivery to the others.
//! - **Identity**: at most one subscriber per [`CallbackId`].
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
//! if a subscriber uses `Arc<Mutex<T>>` and panics while holding the lock.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::dispatch::panic_message;
use crate::payload::PayloadType;
use crate::subscribers::{Subscriber, Verdict};
use crate::weak::CallbackId;

/// Tally of one [`SubscriberSet::publish`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// A gate rejected the payload; no callback ran.
    pub vetoed: bool,
    /// Callbacks that ran.
    pub delivered: usize,
    /// Callbacks suppressed by their own predicate.
    pub filtered: usize,
    /// Subscribers that failed (panic or argument mismatch).
    pub failed: usize,
}

/// Ordered subscribers of one payload type.
pub struct SubscriberSet {
    payload_type: PayloadType,
    entries: Mutex<Vec<Arc<Subscriber>>>,
    publishing: AtomicBool,
}

impl SubscriberSet {
    /// Creates an empty set for `payload_type`.
    pub fn new(payload_type: PayloadType) -> Self {
        Self {
            payload_type,
            entries: Mutex::new(Vec::new()),
            publishing: AtomicBool::new(false),
        }
    }

    /// Payload type shared by every member.
    pub fn payload_type(&self) -> PayloadType {
        self.payload_type
    }

    /// True while [`publish`](Self::publish) is running.
    pub fn is_publishing(&self) -> bool {
        self.publishing.load(Ordering::Acquire)
    }

    /// Appends `subscriber`.
    ///
    /// Returns `false` (and leaves the set unchanged) if a subscriber with the same
    /// id is already present, the subscriber is of another payload type, or a
    /// publish is in flight.
    pub fn add(&self, subscriber: Arc<Subscriber>) -> bool {
        if subscriber.payload_type() != self.payload_type {
            tracing::warn!(
                expected = %self.payload_type,
                got = %subscriber.payload_type(),
                "subscriber rejected: payload type mismatch"
            );
            return false;
        }
        if self.is_publishing() {
            tracing::warn!(
                payload = %self.payload_type,
                "subscriber set is frozen while publishing"
            );
            return false;
        }
        let mut entries = self.entries.lock();
        if entries.iter().any(|s| s.id() == subscriber.id()) {
            return false;
        }
        entries.push(subscriber);
        true
    }

    /// Removes the subscriber with `id`. Refused while publishing.
    pub fn remove(&self, id: CallbackId) -> Option<Arc<Subscriber>> {
        if self.is_publishing() {
            tracing::warn!(
                payload = %self.payload_type,
                "subscriber set is frozen while publishing"
            );
            return None;
        }
        let mut entries = self.entries.lock();
        let index = entries.iter().position(|s| s.id() == id)?;
        Some(entries.remove(index))
    }

    /// Removes exactly this subscriber instance (not just any with the same id).
    pub(crate) fn evict(&self, subscriber: &Arc<Subscriber>) -> bool {
        if self.is_publishing() {
            return false;
        }
        let mut entries = self.entries.lock();
        match entries.iter().position(|s| Arc::ptr_eq(s, subscriber)) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Looks up the subscriber with `id`.
    pub fn get(&self, id: CallbackId) -> Option<Arc<Subscriber>> {
        self.entries.lock().iter().find(|s| s.id() == id).cloned()
    }

    /// True if a subscriber with `id` is present.
    pub fn contains(&self, id: CallbackId) -> bool {
        self.entries.lock().iter().any(|s| s.id() == id)
    }

    /// Number of members, dead ones included until the next sweep.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True if the set has no members.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Snapshot of the members in insertion order.
    pub fn subscribers(&self) -> Vec<Arc<Subscriber>> {
        self.entries.lock().clone()
    }

    /// Delivers `payload` to the members: gates first, then callbacks.
    ///
    /// No lock is held while subscribers run, so they may freely call back into
    /// the messenger.
    pub fn publish(&self, payload: &dyn Any) -> PublishReport {
        let _guard = PublishingGuard::enter(&self.publishing);
        let snapshot = self.subscribers();
        let mut report = PublishReport::default();

        for gate in snapshot.iter().filter(|s| s.is_predicate_only()) {
            match self.run(gate, payload) {
                Some(Verdict::Rejected) => {
                    tracing::debug!(
                        payload = %self.payload_type,
                        gate = %gate.id(),
                        "publish vetoed"
                    );
                    report.vetoed = true;
                    return report;
                }
                Some(_) => {}
                None => report.failed += 1,
            }
        }

        for callback in snapshot.iter().filter(|s| !s.is_predicate_only()) {
            match self.run(callback, payload) {
                Some(Verdict::Delivered) => report.delivered += 1,
                Some(Verdict::Filtered) => report.filtered += 1,
                Some(_) => {}
                None => report.failed += 1,
            }
        }
        report
    }

    /// Invokes one subscriber; `None` if it failed.
    fn run(&self, subscriber: &Subscriber, payload: &dyn Any) -> Option<Verdict> {
        match catch_unwind(AssertUnwindSafe(|| subscriber.invoke(payload))) {
            Ok(Ok(verdict)) => Some(verdict),
            Ok(Err(e)) => {
                tracing::error!(
                    payload = %self.payload_type,
                    subscriber = %subscriber.id(),
                    label = e.as_label(),
                    error = %e,
                    "subscriber invocation failed"
                );
                None
            }
            Err(panic) => {
                tracing::error!(
                    payload = %self.payload_type,
                    subscriber = %subscriber.id(),
                    error = %panic_message(panic.as_ref()),
                    "subscriber panicked"
                );
                None
            }
        }
    }
}

impl fmt::Debug for SubscriberSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberSet")
            .field("payload_type", &self.payload_type)
            .field("len", &self.len())
            .field("publishing", &self.is_publishing())
            .finish()
    }
}

/// Raises the publishing flag for its lifetime, unwinding included.
struct PublishingGuard<'a>(&'a AtomicBool);

impl<'a> PublishingGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for PublishingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
