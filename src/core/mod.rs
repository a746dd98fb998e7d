//! Messenger core: registry, public handle and home-thread pump.
//!
//! The only public API from this module is [`Messenger`] with its [`Config`]
//! and [`MessengerStats`].
//!
//! Internal modules:
//! - [`registry`]: subscriber sets, pending subscriptions and deferred publishes;
//! - [`messenger`]: the cloneable handle, validation and home-thread routing;
//! - [`pump`]: async loop draining the dispatcher on the home thread;
//! - [`config`]: messenger settings;
//! - [`stats`]: point-in-time counters.

mod config;
mod messenger;
mod pump;
mod registry;
mod stats;

pub use config::Config;
pub use messenger::Messenger;
pub use stats::MessengerStats;
