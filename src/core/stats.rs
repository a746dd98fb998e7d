//! Point-in-time counters describing a messenger.

use std::fmt;

/// Snapshot returned by [`Messenger::stats`](crate::Messenger::stats).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessengerStats {
    /// Payload types with a subscriber set.
    pub payload_types: usize,
    /// Registered subscribers, dead ones included until the next sweep.
    pub subscribers: usize,
    /// Subscriptions buffered while their set was publishing.
    pub pending: usize,
    /// Publishes buffered while their set was publishing.
    pub deferred: usize,
    /// Tasks waiting in the dispatcher for the home thread.
    pub queued: usize,
}

impl fmt::Display for MessengerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "types={} subscribers={} pending={} deferred={} queued={}",
            self.payload_types, self.subscribers, self.pending, self.deferred, self.queued
        )
    }
}
