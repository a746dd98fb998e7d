//! # Subscriber: one registration for one payload type.
//!
//! A [`Subscriber`] binds together:
//! - a **target**: either a callback (`fn(&T)`) or, for predicate-only
//!   subscribers, a gate (`fn(&T) -> bool`);
//! - an optional per-subscription **predicate** filtering the callback;
//! - an optional **state** object handed to the callables as second argument.
//!
//! ## Invocation
//! ```text
//! invoke(payload)
//!   ├─ disposed / target dead ─────────────► Skipped
//!   ├─ callback subscriber
//!   │    ├─ predicate dead or false ───────► Filtered
//!   │    └─ callback(payload[, state]) ────► Delivered
//!   └─ predicate-only subscriber
//!        └─ gate(payload[, state]) ────────► Accepted | Rejected
//! ```
//!
//! ## Rules
//! - Identity is the target's [`CallbackId`]; the predicate does not take part.
//! - Construction validates every callable against the payload type and the
//!   state object; nothing invalid is ever stored.
//! - The state is cloned out before calling, so a callable may dispose its own
//!   subscriber mid-call.
//! - `dispose()` is idempotent and releases receivers and state eagerly.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::BusError;
use crate::payload::PayloadType;
use crate::weak::{CallbackId, Invocation, Signature, WeakCallback};

/// Type-erased subscription state.
pub type State = Arc<dyn Any + Send + Sync>;

/// Result of invoking one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Disposed or dead: nothing ran.
    Skipped,
    /// The subscription's predicate did not pass (or its receiver is gone).
    Filtered,
    /// The callback ran.
    Delivered,
    /// Predicate-only subscriber returned `true`.
    Accepted,
    /// Predicate-only subscriber returned `false`: the publish is vetoed.
    Rejected,
}

enum Target {
    Callback(WeakCallback<()>),
    Gate(WeakCallback<bool>),
}

impl Target {
    fn id(&self) -> CallbackId {
        match self {
            Target::Callback(cb) => cb.id(),
            Target::Gate(p) => p.id(),
        }
    }

    fn is_alive(&self) -> bool {
        match self {
            Target::Callback(cb) => cb.is_alive(),
            Target::Gate(p) => p.is_alive(),
        }
    }

    fn dispose(&self) {
        match self {
            Target::Callback(cb) => cb.dispose(),
            Target::Gate(p) => p.dispose(),
        }
    }
}

/// A single registration in the messenger.
pub struct Subscriber {
    id: CallbackId,
    payload_type: PayloadType,
    target: Target,
    predicate: Option<WeakCallback<bool>>,
    state: Mutex<Option<State>>,
    disposed: AtomicBool,
}

impl Subscriber {
    /// Builds a callback subscriber.
    ///
    /// # Errors
    /// - [`BusError::ArgumentNull`] if `callback` is missing.
    /// - [`BusError::InvalidArgument`] if the callback or predicate does not take
    ///   `payload_type` as first argument, or disagrees with `state` on the second.
    pub fn new(
        payload_type: PayloadType,
        callback: Option<WeakCallback<()>>,
        predicate: Option<WeakCallback<bool>>,
        state: Option<State>,
    ) -> Result<Self, BusError> {
        let callback = callback.ok_or(BusError::ArgumentNull { name: "callback" })?;
        check("callback", callback.signature(), payload_type, state.as_ref())?;
        if let Some(p) = &predicate {
            check("predicate", p.signature(), payload_type, state.as_ref())?;
        }
        Ok(Self::assemble(
            payload_type,
            Target::Callback(callback),
            predicate,
            state,
        ))
    }

    /// Builds a predicate-only subscriber (a gate for every callback of the type).
    ///
    /// # Errors
    /// - [`BusError::ArgumentNull`] if `predicate` is missing.
    /// - [`BusError::InvalidArgument`] on a signature mismatch, as for [`Subscriber::new`].
    pub fn predicate_only(
        payload_type: PayloadType,
        predicate: Option<WeakCallback<bool>>,
        state: Option<State>,
    ) -> Result<Self, BusError> {
        let predicate = predicate.ok_or(BusError::ArgumentNull { name: "predicate" })?;
        check("predicate", predicate.signature(), payload_type, state.as_ref())?;
        Ok(Self::assemble(
            payload_type,
            Target::Gate(predicate),
            None,
            state,
        ))
    }

    fn assemble(
        payload_type: PayloadType,
        target: Target,
        predicate: Option<WeakCallback<bool>>,
        state: Option<State>,
    ) -> Self {
        Self {
            id: target.id(),
            payload_type,
            target,
            predicate,
            state: Mutex::new(state),
            disposed: AtomicBool::new(false),
        }
    }

    /// Registration identity (the target's identity).
    pub fn id(&self) -> CallbackId {
        self.id
    }

    /// Payload type this subscriber listens to.
    pub fn payload_type(&self) -> PayloadType {
        self.payload_type
    }

    /// True for gate subscribers.
    pub fn is_predicate_only(&self) -> bool {
        matches!(self.target, Target::Gate(_))
    }

    /// True until disposed or until the target's receiver is dropped.
    pub fn is_alive(&self) -> bool {
        !self.is_disposed() && self.target.is_alive()
    }

    /// True once [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Delivers `payload` to this subscriber.
    ///
    /// # Errors
    /// [`BusError::ArgumentMismatch`] if `payload` is not of the subscriber's type.
    /// Panics raised by the callables propagate to the caller.
    pub fn invoke(&self, payload: &dyn Any) -> Result<Verdict, BusError> {
        if !self.is_alive() {
            return Ok(Verdict::Skipped);
        }
        if !self.payload_type.matches(payload) {
            return Err(BusError::mismatch(format!(
                "payload is not {}",
                self.payload_type
            )));
        }

        let state = self.state.lock().clone();
        let pair: [&dyn Any; 2];
        let args: &[&dyn Any] = match state.as_deref() {
            Some(state) => {
                pair = [payload, state as &dyn Any];
                &pair
            }
            None => std::slice::from_ref(&payload),
        };

        match &self.target {
            Target::Gate(gate) => Ok(match gate.invoke(args)? {
                Invocation::Success(true) => Verdict::Accepted,
                Invocation::Success(false) => Verdict::Rejected,
                Invocation::NotAlive | Invocation::Disposed => Verdict::Skipped,
            }),
            Target::Callback(callback) => {
                if let Some(predicate) = &self.predicate {
                    if predicate.invoke(args)?.value() != Some(true) {
                        return Ok(Verdict::Filtered);
                    }
                }
                Ok(match callback.invoke(args)? {
                    Invocation::Success(()) => Verdict::Delivered,
                    Invocation::NotAlive | Invocation::Disposed => Verdict::Skipped,
                })
            }
        }
    }

    /// Releases target, predicate and state. Idempotent.
    ///
    /// The state is dropped before returning; when the caller holds a lock the
    /// state's `Drop` could re-enter, use [`release`](Self::release) instead.
    pub fn dispose(&self) {
        drop(self.release());
    }

    /// Disposes the subscriber and hands its state back to the caller, who
    /// decides where it is dropped. `None` if already disposed or stateless.
    pub fn release(&self) -> Option<State> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return None;
        }
        self.target.dispose();
        if let Some(p) = &self.predicate {
            p.dispose();
        }
        self.state.lock().take()
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("payload_type", &self.payload_type)
            .field("predicate_only", &self.is_predicate_only())
            .field("has_predicate", &self.predicate.is_some())
            .field("alive", &self.is_alive())
            .finish()
    }
}

fn check(
    role: &str,
    signature: Signature,
    payload_type: PayloadType,
    state: Option<&State>,
) -> Result<(), BusError> {
    if signature.payload != payload_type {
        return Err(BusError::invalid(format!(
            "{role} takes `{}` but the subscription is for `{payload_type}`",
            signature.payload
        )));
    }
    match (signature.state, state) {
        (None, None) => Ok(()),
        (Some(expected), Some(given)) if expected.matches(&**given) => Ok(()),
        (Some(expected), Some(_)) => Err(BusError::invalid(format!(
            "{role} takes state `{expected}` but a different state object was given"
        ))),
        (Some(expected), None) => Err(BusError::invalid(format!(
            "{role} takes state `{expected}` but no state object was given"
        ))),
        (None, Some(_)) => Err(BusError::invalid(format!(
            "{role} takes no state but a state object was given"
        ))),
    }
}
