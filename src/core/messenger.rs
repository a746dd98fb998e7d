//! # Messenger - typed publish/subscribe on a home thread.
//!
//! [`Messenger`] is the public handle to one message bus. It is cheap to clone and
//! can be used from any thread; all registry mutation and all delivery happen on
//! the **home thread** (the thread that created the messenger).
//!
//! ## Architecture
//! ```text
//! any thread                                 home thread
//! ──────────                                 ───────────
//! subscribe / unsubscribe / publish
//!     │ validate + build Subscriber (sync, errors returned here)
//!     ├─ on home thread ─────────────────────► run inline
//!     └─ elsewhere ── Dispatcher::dispatch ──► drain() / run() ──► run
//!
//! deliver(T, payload)
//!     ├─ lock registry ─► route(T) ─┬─ Absent → done
//!     │                             ├─ Busy   → defer (T is mid-publish)
//!     │                             └─ Ready(set)
//!     ├─ unlock ─► set.publish(payload)        (user code runs here, no lock held)
//!     └─ lock registry ─► process() + take_ready() ─► deliver(deferred...)
//! ```
//!
//! ## Rules
//! - **Validation is synchronous**: bad arguments fail at the call site on every thread.
//! - **Symmetric dispatch**: subscribe, unsubscribe and publish are all routed the
//!   same way, so cross-thread calls are ordered with each other (FIFO).
//! - **Reentrancy**: callbacks may subscribe, unsubscribe and publish. Changes to a
//!   set that is mid-publish are buffered; a publish of a type that is mid-publish
//!   is deferred until that publish completes.
//! - **Weak receivers**: bound callbacks never keep their receiver alive; dead
//!   subscribers are skipped and swept after each publish.
//! - **No user code under the lock**: states of removed subscribers are dropped
//!   after the registry lock is released, so their `Drop` may use the messenger.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//! use weakbus::{Callback, Messenger, Predicate};
//!
//! #[derive(Default)]
//! struct Score(AtomicU32);
//!
//! impl Score {
//!     fn add(&self, points: &u32) {
//!         self.0.fetch_add(*points, Ordering::Relaxed);
//!     }
//! }
//!
//! fn even(points: &u32) -> bool {
//!     points % 2 == 0
//! }
//!
//! let bus = Messenger::new();
//! let score = Arc::new(Score::default());
//!
//! bus.subscribe(Callback::bound(&score, Score::add), Some(Predicate::new(even)))?;
//! bus.publish(3_u32).publish(4_u32);
//! assert_eq!(score.0.load(Ordering::Relaxed), 4);
//!
//! drop(score);
//! bus.publish(8_u32); // dead receiver: skipped and swept
//! assert_eq!(bus.stats().subscribers, 0);
//! # Ok::<(), weakbus::BusError>(())
//! ```

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};
use std::thread::ThreadId;

use parking_lot::Mutex;

use crate::core::config::Config;
use crate::core::registry::{Registry, Route};
use crate::core::stats::MessengerStats;
use crate::dispatch::Dispatcher;
use crate::error::BusError;
use crate::payload::{Payload, PayloadType};
use crate::subscribers::{Callback, Predicate, State, Subscriber};
use crate::weak::CallbackId;

/// State shared by every clone of a [`Messenger`].
struct Shared {
    config: Config,
    dispatcher: Dispatcher,
    registry: Mutex<Registry>,
}

impl Shared {
    /// Runs `f` under the registry lock, then drops the states it released
    /// once the lock is gone.
    fn with_registry<R>(&self, f: impl FnOnce(&mut Registry) -> R) -> R {
        let (out, released) = {
            let mut registry = self.registry.lock();
            let out = f(&mut registry);
            (out, registry.take_released())
        };
        drop(released);
        out
    }

    fn deliver(&self, payload_type: PayloadType, payload: Box<dyn Any + Send + Sync>) {
        let route = self.with_registry(|registry| match registry.route(payload_type) {
            Route::Busy => {
                registry.defer(payload_type, payload);
                None
            }
            route => Some((route, payload)),
        });
        let Some((route, payload)) = route else {
            return;
        };

        if let Route::Ready(set) = route {
            let report = set.publish(&*payload);
            tracing::trace!(
                payload = %payload_type,
                vetoed = report.vetoed,
                delivered = report.delivered,
                filtered = report.filtered,
                failed = report.failed,
                "published"
            );
        }
        drop(payload);

        let ready = self.with_registry(|registry| {
            registry.process();
            registry.take_ready()
        });
        for deferred in ready {
            self.deliver(deferred.payload_type, deferred.payload);
        }
    }
}

/// Handle to a message bus. Clones share the same registry and dispatcher.
#[derive(Clone)]
pub struct Messenger {
    shared: Arc<Shared>,
}

impl Messenger {
    /// Creates a messenger with default settings; the calling thread becomes home.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a messenger with `config`; the calling thread becomes home.
    pub fn with_config(config: Config) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                dispatcher: Dispatcher::new(),
                registry: Mutex::new(Registry::new()),
            }),
        }
    }

    /// Settings this messenger was built with.
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Queue feeding the home thread.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.shared.dispatcher
    }

    /// Identity of the home thread.
    pub fn home_thread(&self) -> ThreadId {
        self.shared.dispatcher.home_thread()
    }

    /// True if the caller runs on the home thread.
    pub fn is_home_thread(&self) -> bool {
        self.shared.dispatcher.is_home_thread()
    }

    /// Subscribes `callback` to payloads of type `T`, optionally filtered by
    /// `predicate`. Subscribing the same callback twice is a no-op.
    ///
    /// # Errors
    /// [`BusError::InvalidArgument`] if the subscriber cannot be built.
    pub fn subscribe<T: Payload>(
        &self,
        callback: Callback<T>,
        predicate: Option<Predicate<T>>,
    ) -> Result<&Self, BusError> {
        let subscriber = Subscriber::new(
            PayloadType::of::<T>(),
            Some(callback.into_inner()),
            predicate.map(Predicate::into_inner),
            None,
        )?;
        Ok(self.register(subscriber))
    }

    /// Like [`subscribe`](Self::subscribe), with a state object handed to the
    /// callback and the predicate on every delivery.
    ///
    /// # Errors
    /// [`BusError::InvalidArgument`] if the subscriber cannot be built.
    pub fn subscribe_with_state<T: Payload, S: Payload>(
        &self,
        callback: Callback<T, S>,
        predicate: Option<Predicate<T, S>>,
        state: S,
    ) -> Result<&Self, BusError> {
        let state: State = Arc::new(state);
        let subscriber = Subscriber::new(
            PayloadType::of::<T>(),
            Some(callback.into_inner()),
            predicate.map(Predicate::into_inner),
            Some(state),
        )?;
        Ok(self.register(subscriber))
    }

    /// Subscribes a type-wide gate: if it returns `false`, no callback of `T`
    /// receives the payload.
    ///
    /// # Errors
    /// [`BusError::InvalidArgument`] if the subscriber cannot be built.
    pub fn subscribe_predicate<T: Payload>(
        &self,
        predicate: Predicate<T>,
    ) -> Result<&Self, BusError> {
        let subscriber =
            Subscriber::predicate_only(PayloadType::of::<T>(), Some(predicate.into_inner()), None)?;
        Ok(self.register(subscriber))
    }

    /// Like [`subscribe_predicate`](Self::subscribe_predicate), with a state object.
    ///
    /// # Errors
    /// [`BusError::InvalidArgument`] if the subscriber cannot be built.
    pub fn subscribe_predicate_with_state<T: Payload, S: Payload>(
        &self,
        predicate: Predicate<T, S>,
        state: S,
    ) -> Result<&Self, BusError> {
        let state: State = Arc::new(state);
        let subscriber = Subscriber::predicate_only(
            PayloadType::of::<T>(),
            Some(predicate.into_inner()),
            Some(state),
        )?;
        Ok(self.register(subscriber))
    }

    /// Registers an already built subscriber.
    pub fn subscribe_raw(&self, subscriber: Subscriber) -> &Self {
        self.register(subscriber)
    }

    fn register(&self, subscriber: Subscriber) -> &Self {
        let subscriber = Arc::new(subscriber);
        self.on_home(move |shared| shared.with_registry(|r| r.subscribe(subscriber)));
        self
    }

    /// Removes the subscription made with `callback` (matched by identity).
    pub fn unsubscribe<T: Payload, S: Payload>(&self, callback: &Callback<T, S>) -> &Self {
        self.remove(PayloadType::of::<T>(), callback.id())
    }

    /// Removes the predicate-only subscription made with `predicate`.
    pub fn unsubscribe_predicate<T: Payload, S: Payload>(
        &self,
        predicate: &Predicate<T, S>,
    ) -> &Self {
        self.remove(PayloadType::of::<T>(), predicate.id())
    }

    fn remove(&self, payload_type: PayloadType, id: CallbackId) -> &Self {
        self.on_home(move |shared| {
            shared.with_registry(|r| r.unsubscribe(payload_type, id));
        });
        self
    }

    /// Delivers `payload` to every subscriber of `T`.
    ///
    /// Runs inline on the home thread; from any other thread the delivery waits
    /// for the next drain.
    pub fn publish<T: Payload>(&self, payload: T) -> &Self {
        let payload_type = PayloadType::of::<T>();
        self.on_home(move |shared| shared.deliver(payload_type, Box::new(payload)));
        self
    }

    /// Dynamically typed publish.
    ///
    /// # Errors
    /// - [`BusError::ArgumentNull`] if `payload_type` or `payload` is missing.
    /// - [`BusError::InvalidCast`] if `payload` is not an instance of `payload_type`.
    pub fn publish_dyn(
        &self,
        payload_type: Option<PayloadType>,
        payload: Option<Box<dyn Any + Send + Sync>>,
    ) -> Result<&Self, BusError> {
        let payload_type = payload_type.ok_or(BusError::ArgumentNull {
            name: "payload_type",
        })?;
        let payload = payload.ok_or(BusError::ArgumentNull { name: "payload" })?;
        if !payload_type.matches(&*payload) {
            return Err(BusError::InvalidCast {
                expected: payload_type.name(),
            });
        }
        self.on_home(move |shared| shared.deliver(payload_type, payload));
        Ok(self)
    }

    /// Runs the work dispatched to the home thread. Returns how many tasks ran.
    ///
    /// At most [`Config::drain_budget`] tasks run per call (all present ones if `0`).
    ///
    /// # Errors
    /// [`BusError::NotHomeThread`] if called from any other thread.
    pub fn drain(&self) -> Result<usize, BusError> {
        self.shared
            .dispatcher
            .drain_at_most(self.shared.config.drain_limit())
    }

    /// Number of subscribers currently in the set for `T`.
    pub fn subscriber_count<T: Payload>(&self) -> usize {
        self.shared.registry.lock().count(PayloadType::of::<T>())
    }

    /// Point-in-time counters.
    pub fn stats(&self) -> MessengerStats {
        let mut stats = self.shared.registry.lock().stats();
        stats.queued = self.shared.dispatcher.len();
        stats
    }

    fn on_home<F>(&self, work: F)
    where
        F: FnOnce(&Shared) + Send + 'static,
    {
        if self.is_home_thread() {
            work(&self.shared);
            return;
        }
        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        self.shared.dispatcher.dispatch(move || {
            if let Some(shared) = shared.upgrade() {
                work(&shared);
            }
        });
    }
}

impl Default for Messenger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Messenger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Messenger")
            .field("home", &self.home_thread())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use tracing_test::traced_test;

    use crate::weak::WeakCallback;

    /// Records what it receives, tagged with its name.
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn new(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                log: Arc::clone(log),
            })
        }

        fn on_i32(&self, n: &i32) {
            self.log.lock().push(format!("{} {n}", self.name));
        }

        fn on_text(&self, s: &String) {
            self.log.lock().push(format!("{} {s}", self.name));
        }

        fn deny(&self, n: &i32) -> bool {
            self.log.lock().push(format!("{} gate {n}", self.name));
            false
        }

        fn allow(&self, n: &i32) -> bool {
            self.log.lock().push(format!("{} gate {n}", self.name));
            true
        }

        fn explode(&self, _n: &i32) -> bool {
            panic!("gate failure");
        }

        fn crash(&self, _n: &i32) {
            panic!("callback failure");
        }
    }

    fn journal() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn taken(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        std::mem::take(&mut *log.lock())
    }

    #[test]
    fn test_same_callback_subscribed_twice_delivers_once() {
        let bus = Messenger::new();
        let log = journal();
        let rec = Recorder::new("a", &log);

        bus.subscribe(Callback::bound(&rec, Recorder::on_i32), None)
            .unwrap()
            .subscribe(Callback::bound(&rec, Recorder::on_i32), None)
            .unwrap();
        bus.publish(1_i32);

        assert_eq!(taken(&log), vec!["a 1"]);
        assert_eq!(bus.subscriber_count::<i32>(), 1);
    }

    #[test]
    fn test_predicate_only_subscriber_vetoes() {
        let bus = Messenger::new();
        let log = journal();
        let gate = Recorder::new("g", &log);
        let rec = Recorder::new("b", &log);

        bus.subscribe(Callback::bound(&rec, Recorder::on_i32), None)
            .unwrap();
        bus.subscribe_predicate(Predicate::bound(&gate, Recorder::deny))
            .unwrap();
        bus.publish(5_i32);
        assert_eq!(taken(&log), vec!["g gate 5"]);

        bus.unsubscribe_predicate(&Predicate::bound(&gate, Recorder::deny));
        bus.publish(6_i32);
        assert_eq!(taken(&log), vec!["b 6"]);
    }

    #[test]
    fn test_all_gates_run_before_callbacks() {
        let bus = Messenger::new();
        let log = journal();
        let first = Recorder::new("g1", &log);
        let second = Recorder::new("g2", &log);
        let rec = Recorder::new("c", &log);

        bus.subscribe(Callback::bound(&rec, Recorder::on_i32), None)
            .unwrap();
        bus.subscribe_predicate(Predicate::bound(&first, Recorder::allow))
            .unwrap();
        bus.subscribe_predicate(Predicate::bound(&second, Recorder::allow))
            .unwrap();
        bus.publish(1_i32);

        assert_eq!(taken(&log), vec!["g1 gate 1", "g2 gate 1", "c 1"]);
    }

    #[test]
    #[traced_test]
    fn test_panicking_gate_does_not_veto() {
        let bus = Messenger::new();
        let log = journal();
        let gate = Recorder::new("g", &log);
        let rec = Recorder::new("c", &log);

        bus.subscribe_predicate(Predicate::bound(&gate, Recorder::explode))
            .unwrap();
        bus.subscribe(Callback::bound(&rec, Recorder::on_i32), None)
            .unwrap();
        bus.publish(2_i32);

        assert_eq!(taken(&log), vec!["c 2"]);
        assert!(logs_contain("subscriber panicked"));
    }

    #[test]
    fn test_even_predicate_example() {
        fn even(n: &i32) -> bool {
            n % 2 == 0
        }

        let bus = Messenger::new();
        let log = journal();
        let rec = Recorder::new("c", &log);

        bus.subscribe(
            Callback::bound(&rec, Recorder::on_i32),
            Some(Predicate::new(even)),
        )
        .unwrap();
        bus.publish(3_i32);
        assert!(taken(&log).is_empty());
        bus.publish(4_i32);
        assert_eq!(taken(&log), vec!["c 4"]);
    }

    /// State mutated by the predicate and read by the callback.
    #[derive(Default)]
    struct Tally {
        checked: AtomicUsize,
        seen_by_callback: Mutex<Vec<usize>>,
    }

    fn count_then_pass(_n: &i32, tally: &Arc<Tally>) -> bool {
        tally.checked.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn read_tally(_n: &i32, tally: &Arc<Tally>) {
        let checked = tally.checked.load(Ordering::SeqCst);
        tally.seen_by_callback.lock().push(checked);
    }

    #[test]
    fn test_state_is_threaded_through_predicate_and_callback() {
        let bus = Messenger::new();
        let tally = Arc::new(Tally::default());

        bus.subscribe_with_state(
            Callback::with_state(read_tally),
            Some(Predicate::with_state(count_then_pass)),
            Arc::clone(&tally),
        )
        .unwrap();
        bus.publish(1_i32).publish(2_i32);
        assert_eq!(*tally.seen_by_callback.lock(), vec![1, 2]);

        bus.unsubscribe(&Callback::with_state(read_tally));
        assert_eq!(Arc::strong_count(&tally), 1);
    }

    #[test]
    fn test_dead_receiver_is_skipped_and_swept() {
        let bus = Messenger::new();
        let log = journal();
        let alive = Recorder::new("alive", &log);
        let doomed = Recorder::new("doomed", &log);

        bus.subscribe(Callback::bound(&doomed, Recorder::on_i32), None)
            .unwrap();
        bus.subscribe(Callback::bound(&alive, Recorder::on_i32), None)
            .unwrap();
        assert_eq!(bus.stats().subscribers, 2);

        drop(doomed);
        bus.publish(1_i32);
        assert_eq!(taken(&log), vec!["alive 1"]);
        assert_eq!(bus.stats().subscribers, 1);

        bus.publish(2_i32);
        assert_eq!(taken(&log), vec!["alive 2"]);

        drop(alive);
        bus.publish(3_i32);
        assert!(taken(&log).is_empty());
        assert_eq!(bus.stats(), MessengerStats::default());
    }

    #[test]
    #[traced_test]
    fn test_panicking_callback_and_dead_receiver_leave_bus_clean() {
        let bus = Messenger::new();
        let log = journal();
        let crasher = Recorder::new("crasher", &log);
        let doomed = Recorder::new("doomed", &log);
        let alive = Recorder::new("alive", &log);

        bus.subscribe(Callback::bound(&crasher, Recorder::crash), None)
            .unwrap()
            .subscribe(Callback::bound(&doomed, Recorder::on_i32), None)
            .unwrap()
            .subscribe(Callback::bound(&alive, Recorder::on_i32), None)
            .unwrap();
        drop(doomed);

        bus.publish(4_i32);
        assert_eq!(taken(&log), vec!["alive 4"]);
        assert!(logs_contain("subscriber panicked"));

        let stats = bus.stats();
        assert_eq!(stats.subscribers, 2);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.deferred, 0);

        // the set is usable again after the panic
        bus.publish(5_i32);
        assert_eq!(taken(&log), vec!["alive 5"]);
    }

    /// Subscription state that publishes a farewell `String` when dropped.
    struct Farewell {
        bus: Messenger,
    }

    impl Drop for Farewell {
        fn drop(&mut self) {
            self.bus.publish(String::from("left"));
        }
    }

    fn on_farewell(_n: &i32, _farewell: &Farewell) {}

    struct Guest;

    impl Guest {
        fn on_i32(&self, _n: &i32, _farewell: &Farewell) {}
    }

    #[test]
    fn test_state_dropped_on_unsubscribe_may_use_messenger() {
        let bus = Messenger::new();
        let log = journal();
        let rec = Recorder::new("rec", &log);

        bus.subscribe(Callback::bound(&rec, Recorder::on_text), None)
            .unwrap()
            .subscribe_with_state(
                Callback::with_state(on_farewell),
                None,
                Farewell { bus: bus.clone() },
            )
            .unwrap();
        assert_eq!(bus.stats().subscribers, 2);

        bus.unsubscribe(&Callback::with_state(on_farewell));
        assert_eq!(taken(&log), vec!["rec left"]);
        assert_eq!(bus.stats().subscribers, 1);
    }

    #[test]
    fn test_state_dropped_by_sweep_may_use_messenger() {
        let bus = Messenger::new();
        let log = journal();
        let rec = Recorder::new("rec", &log);
        let guest = Arc::new(Guest);

        bus.subscribe(Callback::bound(&rec, Recorder::on_text), None)
            .unwrap()
            .subscribe_with_state(
                Callback::bound_with_state(&guest, Guest::on_i32),
                None,
                Farewell { bus: bus.clone() },
            )
            .unwrap();

        drop(guest);
        bus.publish(1_i32);
        assert_eq!(taken(&log), vec!["rec left"]);
        assert_eq!(bus.subscriber_count::<i32>(), 0);
        assert_eq!(bus.stats().deferred, 0);
    }

    #[test]
    fn test_subscribe_raw_registers_prebuilt_subscriber() {
        let bus = Messenger::new();
        let log = journal();
        let rec = Recorder::new("raw", &log);
        let subscriber = Subscriber::new(
            PayloadType::of::<i32>(),
            Some(WeakCallback::bind(&rec, Recorder::on_i32)),
            None,
            None,
        )
        .unwrap();

        bus.subscribe_raw(subscriber).publish(3_i32);
        assert_eq!(taken(&log), vec!["raw 3"]);

        // same identity as the typed handle
        bus.unsubscribe(&Callback::bound(&rec, Recorder::on_i32));
        assert_eq!(bus.subscriber_count::<i32>(), 0);
    }

    /// Unsubscribes itself from `i32`, subscribes `follower` to `String` and
    /// publishes a `String`, all from inside its own callback.
    struct Reentrant {
        me: Weak<Reentrant>,
        bus: Messenger,
        follower: Arc<Recorder>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Reentrant {
        fn on_i32(&self, n: &i32) {
            self.log.lock().push(format!("reentrant {n}"));
            let me = self.me.upgrade().unwrap();
            self.bus
                .unsubscribe(&Callback::bound(&me, Reentrant::on_i32))
                .subscribe(Callback::bound(&self.follower, Recorder::on_text), None)
                .unwrap()
                .publish(format!("nested {n}"));
            self.log.lock().push("reentrant done".to_string());
        }
    }

    #[test]
    fn test_reentrant_unsubscribe_subscribe_publish() {
        let bus = Messenger::new();
        let log = journal();
        let follower = Recorder::new("follower", &log);
        let tail = Recorder::new("tail", &log);
        let reentrant = Arc::new_cyclic(|me| Reentrant {
            me: me.clone(),
            bus: bus.clone(),
            follower: Arc::clone(&follower),
            log: Arc::clone(&log),
        });

        bus.subscribe(Callback::bound(&reentrant, Reentrant::on_i32), None)
            .unwrap();
        bus.subscribe(Callback::bound(&tail, Recorder::on_i32), None)
            .unwrap();
        bus.publish(1_i32);

        assert_eq!(
            taken(&log),
            vec!["reentrant 1", "follower nested 1", "reentrant done", "tail 1"]
        );
        assert_eq!(bus.subscriber_count::<i32>(), 1);
        assert_eq!(bus.subscriber_count::<String>(), 1);

        bus.publish(2_i32);
        assert_eq!(taken(&log), vec!["tail 2"]);
    }

    /// Subscribes `late` to `i32` from inside an `i32` delivery.
    struct Recruiter {
        bus: Messenger,
        late: Arc<Recorder>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recruiter {
        fn on_i32(&self, n: &i32) {
            self.log.lock().push(format!("recruiter {n}"));
            self.bus
                .subscribe(Callback::bound(&self.late, Recorder::on_i32), None)
                .unwrap();
        }
    }

    #[test]
    fn test_subscribe_during_publish_misses_in_flight_payload() {
        let bus = Messenger::new();
        let log = journal();
        let recruiter = Arc::new(Recruiter {
            bus: bus.clone(),
            late: Recorder::new("late", &log),
            log: Arc::clone(&log),
        });

        bus.subscribe(Callback::bound(&recruiter, Recruiter::on_i32), None)
            .unwrap();
        bus.publish(1_i32);
        assert_eq!(taken(&log), vec!["recruiter 1"]);
        assert_eq!(bus.stats().pending, 0);
        assert_eq!(bus.subscriber_count::<i32>(), 2);

        bus.publish(2_i32);
        assert_eq!(taken(&log), vec!["recruiter 2", "late 2"]);
    }

    /// Unsubscribes `victim` (registered after it) during the same publish.
    struct Assassin {
        bus: Messenger,
        victim: Arc<Recorder>,
    }

    impl Assassin {
        fn on_i32(&self, _n: &i32) {
            self.bus
                .unsubscribe(&Callback::bound(&self.victim, Recorder::on_i32));
        }
    }

    #[test]
    fn test_unsubscribe_mid_publish_stops_later_subscriber() {
        let bus = Messenger::new();
        let log = journal();
        let victim = Recorder::new("victim", &log);
        let assassin = Arc::new(Assassin {
            bus: bus.clone(),
            victim: Arc::clone(&victim),
        });

        bus.subscribe(Callback::bound(&assassin, Assassin::on_i32), None)
            .unwrap();
        bus.subscribe(Callback::bound(&victim, Recorder::on_i32), None)
            .unwrap();
        bus.publish(1_i32);

        assert!(taken(&log).is_empty());
        assert_eq!(bus.subscriber_count::<i32>(), 1);
        assert_eq!(bus.stats().subscribers, 1);
    }

    /// Publishes a second `i32` from inside the first `i32` delivery.
    struct Echo {
        bus: Messenger,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Echo {
        fn on_i32(&self, n: &i32) {
            self.log.lock().push(format!("echo {n}"));
            if *n == 1 {
                self.bus.publish(2_i32);
                self.log.lock().push("echo returned".to_string());
            }
        }
    }

    #[test]
    fn test_same_type_publish_is_deferred_until_delivery_completes() {
        let bus = Messenger::new();
        let log = journal();
        let echo = Arc::new(Echo {
            bus: bus.clone(),
            log: Arc::clone(&log),
        });
        let tail = Recorder::new("tail", &log);

        bus.subscribe(Callback::bound(&echo, Echo::on_i32), None)
            .unwrap();
        bus.subscribe(Callback::bound(&tail, Recorder::on_i32), None)
            .unwrap();
        bus.publish(1_i32);

        assert_eq!(
            taken(&log),
            vec!["echo 1", "echo returned", "tail 1", "echo 2", "tail 2"]
        );
        assert_eq!(bus.stats().deferred, 0);
    }

    #[test]
    fn test_cross_thread_publish_runs_on_home_thread_after_drain() {
        struct Witness {
            threads: Mutex<Vec<ThreadId>>,
        }

        impl Witness {
            fn on_u64(&self, _n: &u64) {
                self.threads.lock().push(thread::current().id());
            }
        }

        let bus = Messenger::new();
        let witness = Arc::new(Witness {
            threads: Mutex::new(Vec::new()),
        });
        bus.subscribe(Callback::bound(&witness, Witness::on_u64), None)
            .unwrap();

        let remote = bus.clone();
        thread::spawn(move || {
            remote.publish(1_u64).publish(2_u64);
        })
        .join()
        .unwrap();

        assert!(witness.threads.lock().is_empty());
        assert_eq!(bus.stats().queued, 2);

        assert_eq!(bus.drain(), Ok(2));
        let home = thread::current().id();
        assert_eq!(*witness.threads.lock(), vec![home, home]);
        assert_eq!(bus.home_thread(), home);
    }

    #[test]
    fn test_cross_thread_subscribe_is_dispatched() {
        let bus = Messenger::new();
        let log = journal();
        let rec = Recorder::new("remote", &log);

        let remote = bus.clone();
        let r = Arc::clone(&rec);
        thread::spawn(move || {
            assert!(!remote.is_home_thread());
            remote
                .subscribe(Callback::bound(&r, Recorder::on_i32), None)
                .unwrap()
                .publish(9_i32);
        })
        .join()
        .unwrap();

        assert_eq!(bus.subscriber_count::<i32>(), 0);
        bus.drain().unwrap();
        assert_eq!(taken(&log), vec!["remote 9"]);
    }

    #[test]
    fn test_drain_off_home_thread_is_rejected() {
        let bus = Messenger::new();
        let remote = bus.clone();
        let res = thread::spawn(move || remote.drain()).join().unwrap();
        assert_eq!(res, Err(BusError::NotHomeThread));
    }

    #[test]
    fn test_drain_budget_is_applied() {
        let bus = Messenger::with_config(Config {
            drain_budget: 1,
            ..Config::default()
        });
        let remote = bus.clone();
        thread::spawn(move || {
            remote.publish(1_u8).publish(2_u8);
        })
        .join()
        .unwrap();

        assert_eq!(bus.drain(), Ok(1));
        assert_eq!(bus.drain(), Ok(1));
        assert_eq!(bus.drain(), Ok(0));
    }

    #[test]
    fn test_dynamic_publish_validation() {
        struct Foo;
        struct Bar;

        let bus = Messenger::new();
        let err = bus
            .publish_dyn(Some(PayloadType::of::<Foo>()), Some(Box::new(Bar)))
            .unwrap_err();
        assert!(matches!(err, BusError::InvalidCast { .. }));

        let err = bus.publish_dyn(None, Some(Box::new(Foo))).unwrap_err();
        assert_eq!(
            err,
            BusError::ArgumentNull {
                name: "payload_type"
            }
        );

        let err = bus
            .publish_dyn(Some(PayloadType::of::<Foo>()), None)
            .unwrap_err();
        assert_eq!(err, BusError::ArgumentNull { name: "payload" });
    }

    #[test]
    fn test_dynamic_publish_delivers() {
        let bus = Messenger::new();
        let log = journal();
        let rec = Recorder::new("dyn", &log);
        bus.subscribe(Callback::bound(&rec, Recorder::on_i32), None)
            .unwrap();

        bus.publish_dyn(Some(PayloadType::of::<i32>()), Some(Box::new(11_i32)))
            .unwrap();
        assert_eq!(taken(&log), vec!["dyn 11"]);
    }

    #[test]
    fn test_invalid_publish_fails_on_calling_thread() {
        let bus = Messenger::new();
        let remote = bus.clone();
        let res = thread::spawn(move || {
            remote
                .publish_dyn(Some(PayloadType::of::<u8>()), Some(Box::new(1_i64)))
                .map(|_| ())
        })
        .join()
        .unwrap();

        assert_eq!(res, Err(BusError::InvalidCast { expected: "u8" }));
        assert_eq!(bus.stats().queued, 0);
    }

    #[test]
    fn test_queued_tasks_do_not_keep_messenger_alive() {
        let bus = Messenger::new();
        let remote = bus.clone();
        thread::spawn(move || {
            remote.publish(1_i32);
        })
        .join()
        .unwrap();
        assert_eq!(bus.stats().queued, 1);

        let shared = Arc::downgrade(&bus.shared);
        drop(bus);
        assert!(shared.upgrade().is_none());
    }
}
