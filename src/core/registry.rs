//! # Subscription registry - bookkeeping behind the messenger.
//!
//! Registry owns every subscriber set and the buffers that keep sets untouched
//! while they publish:
//! - `subscribe` → insert into the type's set, or buffer if that set is publishing
//! - `unsubscribe` → dispose at once, remove now or at the next sweep
//! - `route` → pick the set a publish goes to, or defer the publish
//! - `process` → sweep dead subscribers, flush buffered subscriptions
//!
//! ## Architecture
//! ```text
//! sets:        HashMap<PayloadType, Arc<SubscriberSet>>
//! subscribers: [all live registrations, insertion order]   (sweep source)
//! pending:     [subscriptions made while their set published]
//! deferred:    [publishes made while their set published]
//!
//! publish(T) ──► route(T) ─┬─► Absent  → nothing to do
//!                          ├─► Busy    → defer(T, payload)
//!                          └─► Ready(set) → set.publish(..) → process() → take_ready()
//! ```
//!
//! ## Rules
//! - The registry never calls user code; the messenger runs sets outside its lock.
//! - A publishing set is never resized: removals wait for the next sweep and
//!   insertions wait in `pending`.
//! - Empty sets are dropped from the map when found empty outside a publish.
//! - Unsubscribe disposes the subscriber immediately, so it receives nothing more,
//!   even from an in-flight publish.
//! - States of disposed subscribers are parked, never dropped under the lock;
//!   the messenger takes them with `take_released` and drops them after unlocking.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::stats::MessengerStats;
use crate::payload::PayloadType;
use crate::subscribers::{State, Subscriber, SubscriberSet};
use crate::weak::CallbackId;

/// Publish parked until its set finished publishing.
pub(crate) struct Deferred {
    pub(crate) payload_type: PayloadType,
    pub(crate) payload: Box<dyn Any + Send + Sync>,
}

/// Where a publish should go.
pub(crate) enum Route {
    /// No subscriber for the type.
    Absent,
    /// The type's set is mid-publish; defer.
    Busy,
    /// Publish to this set (outside the registry lock).
    Ready(Arc<SubscriberSet>),
}

/// Subscription state of one messenger.
#[derive(Default)]
pub(crate) struct Registry {
    sets: HashMap<PayloadType, Arc<SubscriberSet>>,
    subscribers: Vec<Arc<Subscriber>>,
    pending: Vec<Arc<Subscriber>>,
    deferred: Vec<Deferred>,
    released: Vec<State>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers `subscriber`, buffering it while its set publishes.
    pub(crate) fn subscribe(&mut self, subscriber: Arc<Subscriber>) {
        if self.is_busy(subscriber.payload_type()) {
            tracing::debug!(
                payload = %subscriber.payload_type(),
                subscriber = %subscriber.id(),
                "subscription buffered until publish completes"
            );
            self.pending.push(subscriber);
            return;
        }
        self.insert(subscriber);
    }

    fn insert(&mut self, subscriber: Arc<Subscriber>) {
        if !subscriber.is_alive() {
            tracing::trace!(subscriber = %subscriber.id(), "dead subscriber not inserted");
            self.retire(&subscriber);
            return;
        }
        let payload_type = subscriber.payload_type();
        let set = self
            .sets
            .entry(payload_type)
            .or_insert_with(|| Arc::new(SubscriberSet::new(payload_type)));

        if set.is_publishing() {
            self.pending.push(subscriber);
            return;
        }
        if set.add(Arc::clone(&subscriber)) {
            tracing::debug!(
                payload = %payload_type,
                subscriber = %subscriber.id(),
                predicate_only = subscriber.is_predicate_only(),
                "subscribed"
            );
            self.subscribers.push(subscriber);
        } else {
            tracing::trace!(subscriber = %subscriber.id(), "already subscribed");
            self.retire(&subscriber);
        }
    }

    /// Removes the registration `id` for `payload_type`.
    pub(crate) fn unsubscribe(&mut self, payload_type: PayloadType, id: CallbackId) {
        let (cancelled, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|s| s.payload_type() == payload_type && s.id() == id);
        self.pending = pending;
        for subscriber in &cancelled {
            self.retire(subscriber);
        }

        let Some(set) = self.sets.get(&payload_type).cloned() else {
            return;
        };
        let publishing = set.is_publishing();
        if let Some(subscriber) = set.get(id) {
            self.retire(&subscriber);
            if !publishing {
                set.evict(&subscriber);
                self.subscribers.retain(|s| !Arc::ptr_eq(s, &subscriber));
            }
            tracing::debug!(
                payload = %payload_type,
                subscriber = %id,
                deferred = publishing,
                "unsubscribed"
            );
        }
        if !publishing && set.is_empty() {
            self.sets.remove(&payload_type);
        }
    }

    /// Decides where a publish of `payload_type` goes.
    pub(crate) fn route(&mut self, payload_type: PayloadType) -> Route {
        let Some(set) = self.sets.get(&payload_type) else {
            return Route::Absent;
        };
        if set.is_publishing() {
            return Route::Busy;
        }
        if set.is_empty() {
            self.sets.remove(&payload_type);
            return Route::Absent;
        }
        Route::Ready(Arc::clone(set))
    }

    /// Parks a publish until its set is idle again.
    pub(crate) fn defer(&mut self, payload_type: PayloadType, payload: Box<dyn Any + Send + Sync>) {
        tracing::debug!(payload = %payload_type, "publish deferred: set is mid-publish");
        self.deferred.push(Deferred {
            payload_type,
            payload,
        });
    }

    /// Takes the deferred publishes whose set is idle, in publish order.
    pub(crate) fn take_ready(&mut self) -> Vec<Deferred> {
        let parked = std::mem::take(&mut self.deferred);
        let (ready, busy): (Vec<_>, Vec<_>) = parked
            .into_iter()
            .partition(|d| !self.is_busy(d.payload_type));
        self.deferred = busy;
        ready
    }

    /// Sweeps dead subscribers and flushes buffered subscriptions.
    pub(crate) fn process(&mut self) {
        let dead: Vec<Arc<Subscriber>> = self
            .subscribers
            .iter()
            .filter(|s| !s.is_alive())
            .cloned()
            .collect();

        for subscriber in dead {
            let payload_type = subscriber.payload_type();
            if let Some(set) = self.sets.get(&payload_type) {
                if set.is_publishing() {
                    continue;
                }
                set.evict(&subscriber);
                if set.is_empty() {
                    self.sets.remove(&payload_type);
                }
            }
            self.subscribers.retain(|s| !Arc::ptr_eq(s, &subscriber));
            self.retire(&subscriber);
            tracing::trace!(
                payload = %payload_type,
                subscriber = %subscriber.id(),
                "dead subscriber swept"
            );
        }

        for subscriber in std::mem::take(&mut self.pending) {
            self.insert(subscriber);
        }
    }

    /// Number of members in the set for `payload_type`.
    pub(crate) fn count(&self, payload_type: PayloadType) -> usize {
        self.sets.get(&payload_type).map_or(0, |set| set.len())
    }

    pub(crate) fn stats(&self) -> MessengerStats {
        MessengerStats {
            payload_types: self.sets.len(),
            subscribers: self.subscribers.len(),
            pending: self.pending.len(),
            deferred: self.deferred.len(),
            queued: 0,
        }
    }

    /// Hands over the states of subscribers disposed since the last call.
    ///
    /// Drop them after releasing the registry lock: a state's `Drop` may call
    /// back into the messenger.
    pub(crate) fn take_released(&mut self) -> Vec<State> {
        std::mem::take(&mut self.released)
    }

    fn retire(&mut self, subscriber: &Subscriber) {
        if let Some(state) = subscriber.release() {
            self.released.push(state);
        }
    }

    fn is_busy(&self, payload_type: PayloadType) -> bool {
        self.sets
            .get(&payload_type)
            .is_some_and(|set| set.is_publishing())
    }
}
