//! # weakbus
//!
//! **Weakbus** is an in-process, typed publish/subscribe message bus.
//!
//! Subscribers are keyed by payload type and held **weakly**: registering a
//! method of some object never keeps that object alive, and subscriptions of
//! dropped objects clean themselves up. All delivery happens on a single home
//! thread; other threads hand their work over through a dispatcher queue.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   worker thread              worker thread              home thread
//!  ┌──────────────┐           ┌──────────────┐           ┌──────────────┐
//!  │ publish(T)   │           │ subscribe(U) │           │ publish(T)   │
//!  └──────┬───────┘           └──────┬───────┘           └──────┬───────┘
//!         ▼                          ▼                          │ inline
//! ┌─────────────────────────────────────────────────┐           │
//! │  Dispatcher (FIFO of boxed tasks, any thread)   │           │
//! └──────────────────────┬──────────────────────────┘           │
//!                        ▼ drain() / run() on the home thread   ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Messenger / Registry                                             │
//! │  - SubscriberSet per payload type (insertion order)               │
//! │  - flat subscriber list (liveness sweeps)                         │
//! │  - pending subscriptions, deferred publishes                      │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   SubscriberSet<T>   SubscriberSet<U>   SubscriberSet<V>
//!     pass 1: gates (predicate-only), any `false` vetoes
//!     pass 2: callbacks (own predicate, then callback)
//!        │
//!        ▼
//!   WeakCallback ──► WeakHolder ──► receiver (Weak<O>, upgraded per call)
//! ```
//!
//! ### Publish lifecycle
//! ```text
//! publish(payload: T)
//!   ├─► off home thread ─► dispatch, return
//!   └─► on home thread:
//!         ├─ set for T mid-publish ─► defer until it completes
//!         ├─ set.publish(payload)
//!         │     ├─ gates in order   ─► Rejected? stop
//!         │     └─ callbacks in order (panics caught and logged)
//!         ├─ process(): sweep dead subscribers, insert pending ones
//!         └─ deliver deferred publishes
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types                                   |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Messaging**     | Subscribe, unsubscribe and publish by payload type.          | [`Messenger`], [`Callback`], [`Predicate`]  |
//! | **Objects**       | Subscribe and unsubscribe an object as a unit.               | [`MessengerSubscriber`]                     |
//! | **Weak handles**  | Callables that do not own their receiver.                    | [`WeakCallback`], [`WeakHolder`]            |
//! | **Delivery**      | Two-pass fan-out with type-wide veto.                        | [`SubscriberSet`], [`Subscriber`]           |
//! | **Threading**     | Cross-thread hand-off to the home thread.                    | [`Dispatcher`], [`Messenger::run`]          |
//! | **Errors**        | Typed validation and invocation errors.                      | [`BusError`]                                |
//! | **Configuration** | Pump period and drain budget.                                | [`Config`]                                  |
//!
//! ## Logging
//! The crate emits [`tracing`] events and never installs a subscriber.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use weakbus::{Callback, Messenger, Predicate};
//!
//! struct Chat {
//!     lines: Mutex<Vec<String>>,
//! }
//!
//! impl Chat {
//!     fn on_line(&self, line: &String) {
//!         self.lines.lock().push(line.clone());
//!     }
//! }
//!
//! fn not_muted(line: &String) -> bool {
//!     !line.starts_with("[muted]")
//! }
//!
//! let bus = Messenger::new();
//! let chat = Arc::new(Chat { lines: Mutex::new(Vec::new()) });
//!
//! bus.subscribe(Callback::bound(&chat, Chat::on_line), None)?
//!     .subscribe_predicate(Predicate::new(not_muted))?;
//!
//! bus.publish("hello".to_string())
//!     .publish("[muted] spam".to_string());
//!
//! // from another thread: queued until the home thread drains
//! let remote = bus.clone();
//! std::thread::spawn(move || {
//!     remote.publish("from worker".to_string());
//! })
//! .join()
//! .unwrap();
//! bus.drain()?;
//!
//! assert_eq!(*chat.lines.lock(), vec!["hello", "from worker"]);
//! # Ok::<(), weakbus::BusError>(())
//! ```

mod core;
mod dispatch;
mod error;
mod payload;
mod subscribers;
mod weak;

// ---- Public re-exports ----

pub use core::{Config, Messenger, MessengerStats};
pub use dispatch::Dispatcher;
pub use error::BusError;
pub use payload::{Payload, PayloadType};
pub use subscribers::{
    Callback, MessengerSubscriber, Predicate, PublishReport, State, Subscriber, SubscriberSet,
    Verdict,
};
pub use weak::{CallbackId, Invocation, Signature, WeakCallback, WeakHolder};
