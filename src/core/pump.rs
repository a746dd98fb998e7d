//! # Home-thread pump.
//!
//! [`Messenger::run`] drives the dispatcher from an async loop on the home thread,
//! for hosts that do not have a tick of their own to call
//! [`Messenger::drain`] from.
//!
//! ## Lifecycle
//! ```text
//! run(token)
//!   ├─► not on home thread ─► Err(NotHomeThread)
//!   └─► loop {
//!         select! {
//!           token.cancelled() ─► break
//!           interval.tick()   ─► drain()
//!         }
//!       }
//!       final drain() ─► Ok(())
//! ```
//!
//! ## Rules
//! - Must be awaited on the home thread: a current-thread runtime, or a `LocalSet`
//!   whose thread created the messenger.
//! - Missed ticks are delayed, not bursted.
//! - Work queued before cancellation is executed by the final drain.

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::core::messenger::Messenger;
use crate::error::BusError;

impl Messenger {
    /// Drains the dispatcher every [`Config::tick`](crate::Config::tick) until
    /// `token` is cancelled.
    ///
    /// # Errors
    /// [`BusError::NotHomeThread`] if awaited off the home thread.
    pub async fn run(&self, token: CancellationToken) -> Result<(), BusError> {
        if !self.is_home_thread() {
            return Err(BusError::NotHomeThread);
        }

        let period = self.config().tick_clamped();
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::debug!(?period, "home-thread pump started");

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    self.drain()?;
                }
            }
        }

        let ran = self.drain()?;
        tracing::debug!(final_drain = ran, "home-thread pump stopped");
        Ok(())
    }
}
