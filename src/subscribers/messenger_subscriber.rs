//! # Messenger-aware objects.
//!
//! Provides [`MessengerSubscriber`], a trait for objects that own a [`Messenger`]
//! handle and manage all of their subscriptions as a unit.
//!
//! Implementors supply three things:
//! - **`messenger`**: the bus they talk to
//! - **`subscribe_all`**: register every subscription of the object
//! - **`unsubscribe_all`**: remove them again
//!
//! Every other method is provided and chains on the object itself, so setup code
//! reads as one expression.
//!
//! ## Architecture
//! ```text
//! Arc<Impl> ──subscribe_all()──► subscribe_to / subscribe_gate ... ──► Messenger
//!     │                                                                  │
//!     └──── publish / publish_dyn (returns &Self) ──────────────────────►┘
//! ```
//!
//! ## Rules
//! - Callbacks bound through `self: &Arc<Self>` hold the object weakly; dropping
//!   the last `Arc` ends its subscriptions at the next sweep.
//! - Holding the [`Messenger`] inside the object does not create a cycle: the
//!   messenger never owns its receivers.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use weakbus::{BusError, Callback, Messenger, MessengerSubscriber};
//!
//! struct Greeter {
//!     bus: Messenger,
//!     greeted: Mutex<Vec<String>>,
//! }
//!
//! impl Greeter {
//!     fn on_name(&self, name: &String) {
//!         self.greeted.lock().push(name.clone());
//!     }
//! }
//!
//! impl MessengerSubscriber for Greeter {
//!     fn messenger(&self) -> &Messenger {
//!         &self.bus
//!     }
//!
//!     fn subscribe_all(self: &Arc<Self>) -> Result<&Arc<Self>, BusError> {
//!         self.subscribe_to(Callback::bound(self, Greeter::on_name), None)?;
//!         Ok(self)
//!     }
//!
//!     fn unsubscribe_all(self: &Arc<Self>) -> &Arc<Self> {
//!         self.unsubscribe_from(&Callback::bound(self, Greeter::on_name));
//!         self
//!     }
//! }
//!
//! let greeter = Arc::new(Greeter {
//!     bus: Messenger::new(),
//!     greeted: Mutex::new(Vec::new()),
//! });
//! greeter.subscribe_all()?.publish("ada".to_string());
//! assert_eq!(*greeter.greeted.lock(), vec!["ada"]);
//! # Ok::<(), BusError>(())
//! ```

use std::any::Any;
use std::sync::Arc;

use crate::core::Messenger;
use crate::error::BusError;
use crate::payload::{Payload, PayloadType};
use crate::subscribers::{Callback, Predicate};

/// Object that talks to one [`Messenger`] and subscribes as a unit.
pub trait MessengerSubscriber: Send + Sync + 'static {
    /// The bus this object publishes to and subscribes on.
    fn messenger(&self) -> &Messenger;

    /// Registers every subscription of this object.
    ///
    /// # Errors
    /// Whatever the underlying subscribe calls return.
    fn subscribe_all(self: &Arc<Self>) -> Result<&Arc<Self>, BusError>;

    /// Removes every subscription made by [`subscribe_all`](Self::subscribe_all).
    fn unsubscribe_all(self: &Arc<Self>) -> &Arc<Self>;

    /// [`Messenger::subscribe`], returning `self`.
    ///
    /// # Errors
    /// [`BusError::InvalidArgument`] if the subscriber cannot be built.
    fn subscribe_to<T: Payload>(
        &self,
        callback: Callback<T>,
        predicate: Option<Predicate<T>>,
    ) -> Result<&Self, BusError> {
        self.messenger().subscribe(callback, predicate)?;
        Ok(self)
    }

    /// [`Messenger::subscribe_with_state`], returning `self`.
    ///
    /// # Errors
    /// [`BusError::InvalidArgument`] if the subscriber cannot be built.
    fn subscribe_to_with_state<T: Payload, S: Payload>(
        &self,
        callback: Callback<T, S>,
        predicate: Option<Predicate<T, S>>,
        state: S,
    ) -> Result<&Self, BusError> {
        self.messenger().subscribe_with_state(callback, predicate, state)?;
        Ok(self)
    }

    /// [`Messenger::subscribe_predicate`], returning `self`.
    ///
    /// # Errors
    /// [`BusError::InvalidArgument`] if the subscriber cannot be built.
    fn subscribe_gate<T: Payload>(&self, predicate: Predicate<T>) -> Result<&Self, BusError> {
        self.messenger().subscribe_predicate(predicate)?;
        Ok(self)
    }

    /// [`Messenger::subscribe_predicate_with_state`], returning `self`.
    ///
    /// # Errors
    /// [`BusError::InvalidArgument`] if the subscriber cannot be built.
    fn subscribe_gate_with_state<T: Payload, S: Payload>(
        &self,
        predicate: Predicate<T, S>,
        state: S,
    ) -> Result<&Self, BusError> {
        self.messenger().subscribe_predicate_with_state(predicate, state)?;
        Ok(self)
    }

    /// [`Messenger::unsubscribe`], returning `self`.
    fn unsubscribe_from<T: Payload, S: Payload>(&self, callback: &Callback<T, S>) -> &Self {
        self.messenger().unsubscribe(callback);
        self
    }

    /// [`Messenger::unsubscribe_predicate`], returning `self`.
    fn unsubscribe_gate<T: Payload, S: Payload>(&self, predicate: &Predicate<T, S>) -> &Self {
        self.messenger().unsubscribe_predicate(predicate);
        self
    }

    /// [`Messenger::publish`], returning `self`.
    fn publish<T: Payload>(&self, payload: T) -> &Self {
        self.messenger().publish(payload);
        self
    }

    /// [`Messenger::publish_dyn`], returning `self`.
    ///
    /// # Errors
    /// [`BusError::ArgumentNull`] or [`BusError::InvalidCast`], as for the messenger.
    fn publish_dyn(
        &self,
        payload_type: Option<PayloadType>,
        payload: Option<Box<dyn Any + Send + Sync>>,
    ) -> Result<&Self, BusError> {
        self.messenger().publish_dyn(payload_type, payload)?;
        Ok(self)
    }
}
