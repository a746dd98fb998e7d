//! # Subscribers and their per-type sets.
//!
//! This module provides the building blocks the [`Messenger`](crate::Messenger)
//! stores in its registry:
//!
//! ## Architecture
//! ```text
//! Callback<T, S> / Predicate<T, S>      typed handles (compile-time payload type)
//!        │  into_inner()
//!        ▼
//! Subscriber                            target + optional predicate + optional state
//!        │  add()
//!        ▼
//! SubscriberSet (one per payload type)  publish(): gates first, then callbacks
//! ```
//!
//! ## Subscriber kinds
//! - **Callback subscribers** observe payloads, optionally filtered by their own predicate.
//! - **Predicate-only subscribers** (gates) can veto a publish for every callback of
//!   the type.
//!
//! Objects that own a messenger handle can implement [`MessengerSubscriber`] to
//! subscribe and unsubscribe as a unit.

mod handler;
mod messenger_subscriber;
mod subscriber;
mod subscriber_set;

pub use handler::{Callback, Predicate};
pub use messenger_subscriber::MessengerSubscriber;
pub use subscriber::{State, Subscriber, Verdict};
pub use subscriber_set::{PublishReport, SubscriberSet};
