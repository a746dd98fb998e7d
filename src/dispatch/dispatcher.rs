//! # Dispatcher: hands work from any thread to the home thread.
//!
//! The [`Dispatcher`] owns a FIFO of boxed closures. Any thread may
//! [`dispatch`](Dispatcher::dispatch) into it; only the home thread (the thread
//! that constructed the dispatcher) may [`drain`](Dispatcher::drain) it.
//!
//! ## Architecture
//! ```text
//! worker 1 ──┐
//! worker 2 ──┼── dispatch(task) ──► [unbounded queue] ──► drain() on home thread
//! home     ──┘     (never blocks,                          ├─► task 1 (catch_unwind)
//!                   never runs inline)                     ├─► task 2
//!                                                          └─► task N (present at call time)
//! ```
//!
//! ## Rules
//! - **Non-blocking**: `dispatch()` only enqueues, from every thread, including home.
//! - **Snapshot drain**: `drain()` runs the tasks present when it was called; tasks
//!   enqueued while draining wait for the next drain.
//! - **Isolation**: a panicking task is logged and the drain continues.
//! - **Release**: each task is consumed by its call, captured arguments are dropped
//!   right after it runs.
//! - **Ordering**: FIFO in enqueue order (per producer, and globally interleaved).

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::BusError;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Single-consumer task queue bound to the home thread.
pub struct Dispatcher {
    home: ThreadId,
    tx: mpsc::UnboundedSender<Task>,
    rx: Mutex<mpsc::UnboundedReceiver<Task>>,
    queued: AtomicUsize,
}

impl Dispatcher {
    /// Creates a dispatcher whose home is the calling thread.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            home: thread::current().id(),
            tx,
            rx: Mutex::new(rx),
            queued: AtomicUsize::new(0),
        }
    }

    /// Identity of the home thread.
    pub fn home_thread(&self) -> ThreadId {
        self.home
    }

    /// True if the caller runs on the home thread.
    pub fn is_home_thread(&self) -> bool {
        thread::current().id() == self.home
    }

    /// Enqueues `task` for the next drain. Never blocks and never runs it inline.
    pub fn dispatch<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let queued = self.queued.fetch_add(1, Ordering::AcqRel) + 1;
        // The receiver lives as long as `self`, so the send cannot fail.
        let _ = self.tx.send(Box::new(task));
        tracing::debug!(queued, "task dispatched to home thread");
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    /// True if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs every task queued at call time. Returns how many ran.
    ///
    /// # Errors
    /// [`BusError::NotHomeThread`] if called from any other thread.
    pub fn drain(&self) -> Result<usize, BusError> {
        self.drain_at_most(None)
    }

    /// Like [`drain`](Self::drain), but stops after `limit` tasks when given.
    pub fn drain_at_most(&self, limit: Option<usize>) -> Result<usize, BusError> {
        if !self.is_home_thread() {
            return Err(BusError::NotHomeThread);
        }

        let present = self.len();
        let budget = limit.map_or(present, |l| l.min(present));
        let mut ran = 0;

        for _ in 0..budget {
            // The lock is released before the task runs: tasks may dispatch again.
            let task = match self.rx.lock().try_recv() {
                Ok(task) => task,
                Err(_) => break,
            };
            self.queued.fetch_sub(1, Ordering::AcqRel);
            ran += 1;

            if let Err(panic) = catch_unwind(AssertUnwindSafe(task)) {
                tracing::error!(
                    error = %panic_message(panic.as_ref()),
                    "dispatched task panicked"
                );
            }
        }

        if ran > 0 {
            tracing::debug!(ran, left = self.len(), "dispatcher drained");
        }
        Ok(ran)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("home", &self.home)
            .field("queued", &self.len())
            .finish()
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_dispatch_never_runs_inline() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let l = Arc::clone(&log);
        dispatcher.dispatch(move || l.lock().push(1));

        assert!(log.lock().is_empty());
        assert_eq!(dispatcher.len(), 1);
        assert_eq!(dispatcher.drain(), Ok(1));
        assert_eq!(*log.lock(), vec![1]);
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn test_drain_is_fifo_across_threads() {
        let dispatcher = Arc::new(Dispatcher::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let l = Arc::clone(&log);
            dispatcher.dispatch(move || l.lock().push(i));
        }
        let d = Arc::clone(&dispatcher);
        let l = Arc::clone(&log);
        thread::spawn(move || {
            for i in 3..6 {
                let l = Arc::clone(&l);
                d.dispatch(move || l.lock().push(i));
            }
        })
        .join()
        .unwrap();

        assert_eq!(dispatcher.drain(), Ok(6));
        assert_eq!(*log.lock(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_panicking_task_does_not_stop_drain() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let l = Arc::clone(&log);
        dispatcher.dispatch(move || l.lock().push("before"));
        dispatcher.dispatch(|| panic!("boom"));
        let l = Arc::clone(&log);
        dispatcher.dispatch(move || l.lock().push("after"));

        assert_eq!(dispatcher.drain(), Ok(3));
        assert_eq!(*log.lock(), vec!["before", "after"]);
    }

    #[test]
    fn test_tasks_enqueued_while_draining_wait_for_next_drain() {
        let dispatcher = Arc::new(Dispatcher::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let d = Arc::clone(&dispatcher);
        let l = Arc::clone(&log);
        dispatcher.dispatch(move || {
            l.lock().push("outer");
            let l = Arc::clone(&l);
            d.dispatch(move || l.lock().push("inner"));
        });

        assert_eq!(dispatcher.drain(), Ok(1));
        assert_eq!(*log.lock(), vec!["outer"]);
        assert_eq!(dispatcher.drain(), Ok(1));
        assert_eq!(*log.lock(), vec!["outer", "inner"]);
    }

    #[test]
    fn test_captured_arguments_are_released_after_run() {
        let dispatcher = Dispatcher::new();
        let captured = Arc::new(());
        let c = Arc::clone(&captured);
        dispatcher.dispatch(move || drop(c));
        assert_eq!(Arc::strong_count(&captured), 2);
        dispatcher.drain().unwrap();
        assert_eq!(Arc::strong_count(&captured), 1);
    }

    #[test]
    fn test_drain_limit() {
        let dispatcher = Dispatcher::new();
        for _ in 0..5 {
            dispatcher.dispatch(|| {});
        }
        assert_eq!(dispatcher.drain_at_most(Some(2)), Ok(2));
        assert_eq!(dispatcher.len(), 3);
        assert_eq!(dispatcher.drain_at_most(None), Ok(3));
    }

    #[test]
    fn test_drain_off_home_thread_is_rejected() {
        let dispatcher = Arc::new(Dispatcher::new());
        dispatcher.dispatch(|| {});

        let d = Arc::clone(&dispatcher);
        let res = thread::spawn(move || d.drain()).join().unwrap();
        assert_eq!(res, Err(BusError::NotHomeThread));
        assert_eq!(dispatcher.len(), 1);
        assert!(dispatcher.is_home_thread());
    }

    #[test]
    fn test_panic_message() {
        let p: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(p.as_ref()), "static str");
        let p: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(p.as_ref()), "owned");
        let p: Box<dyn Any + Send> = Box::new(5_u8);
        assert_eq!(panic_message(p.as_ref()), "unknown panic");
    }
}
