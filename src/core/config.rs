//! # Messenger configuration.
//!
//! Provides [`Config`], the settings of a [`Messenger`](crate::Messenger) and of its
//! home-thread pump ([`Messenger::run`](crate::Messenger::run)).
//!
//! ## Sentinel values
//! - `drain_budget = 0` → every task present at drain time runs
//! - `tick` below 1ms → clamped to 1ms by the pump

use std::time::Duration;

/// Settings for a messenger instance.
///
/// ## Field semantics
/// - `tick`: Pump period between two drains of the dispatcher (min 1ms)
/// - `drain_budget`: Max dispatched tasks run per drain (`0` = unlimited)
///
/// ## Notes
/// All fields are public. Prefer the helper accessors over checking the
/// sentinels by hand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Period of the home-thread pump.
    ///
    /// Work dispatched from other threads waits at most about one tick before
    /// it runs on the home thread.
    pub tick: Duration,

    /// Maximum number of dispatched tasks executed by one drain.
    ///
    /// - `0` = all tasks present when the drain starts
    /// - `n > 0` = at most `n`; the rest wait for the next drain
    pub drain_budget: usize,
}

impl Config {
    /// Returns the drain budget as an `Option`.
    ///
    /// - `None` → unlimited
    /// - `Some(n)` → at most `n` tasks per drain
    #[inline]
    pub fn drain_limit(&self) -> Option<usize> {
        if self.drain_budget == 0 {
            None
        } else {
            Some(self.drain_budget)
        }
    }

    /// Returns the pump period clamped to a minimum of 1ms.
    #[inline]
    pub fn tick_clamped(&self) -> Duration {
        self.tick.max(Duration::from_millis(1))
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `tick = 16ms` (about one frame at 60Hz)
    /// - `drain_budget = 0` (unlimited)
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(16),
            drain_budget: 0,
        }
    }
}
