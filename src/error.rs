//! Error types used by the messenger, its subscribers and the dispatcher.
//!
//! All failures surface through one enum, [`BusError`]:
//!
//! - argument validation errors (`ArgumentNull`, `InvalidArgument`, `InvalidCast`)
//!   are returned synchronously to the caller of the public API;
//! - `ArgumentMismatch` is raised when a stored callable is invoked with the wrong
//!   arity or argument types;
//! - `NotHomeThread` guards the operations that may only run on the home thread.
//!
//! Dead or disposed callbacks are **not** errors. They are reported as soft
//! statuses through [`Invocation`](crate::Invocation).
//!
//! Every variant provides `as_label` (stable snake_case, for logs/metrics) and
//! `as_message` (human-readable detail).

use thiserror::Error;

/// # Errors produced by the message bus.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// A required argument (callback, predicate, payload or payload type) is missing.
    #[error("argument `{name}` must not be null")]
    ArgumentNull {
        /// Name of the missing argument.
        name: &'static str,
    },

    /// A subscriber could not be constructed from the given parts.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the arguments.
        reason: String,
    },

    /// Dynamic publish: the payload's runtime type differs from the declared one.
    #[error("payload is not an instance of `{expected}`")]
    InvalidCast {
        /// Name of the declared payload type.
        expected: &'static str,
    },

    /// A stored callable was invoked with arguments that do not fit its signature.
    #[error("argument mismatch: {reason}")]
    ArgumentMismatch {
        /// Which argument did not fit and why.
        reason: String,
    },

    /// A home-thread-only operation was called from another thread.
    #[error("operation is only allowed on the home thread")]
    NotHomeThread,
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use weakbus::BusError;
    ///
    /// let err = BusError::ArgumentNull { name: "payload" };
    /// assert_eq!(err.as_label(), "argument_null");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::ArgumentNull { .. } => "argument_null",
            BusError::InvalidArgument { .. } => "invalid_argument",
            BusError::InvalidCast { .. } => "invalid_cast",
            BusError::ArgumentMismatch { .. } => "argument_mismatch",
            BusError::NotHomeThread => "not_home_thread",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            BusError::ArgumentNull { name } => format!("missing: {name}"),
            BusError::InvalidArgument { reason } => format!("invalid: {reason}"),
            BusError::InvalidCast { expected } => format!("expected payload of type {expected}"),
            BusError::ArgumentMismatch { reason } => format!("mismatch: {reason}"),
            BusError::NotHomeThread => "called off the home thread".to_string(),
        }
    }

    /// Shorthand for building an [`BusError::InvalidArgument`].
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        BusError::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Shorthand for building an [`BusError::ArgumentMismatch`].
    pub(crate) fn mismatch(reason: impl Into<String>) -> Self {
        BusError::ArgumentMismatch {
            reason: reason.into(),
        }
    }

    /// Indicates whether the error is a caller contract violation detected before
    /// anything was registered or delivered.
    ///
    /// # Example
    /// ```
    /// use weakbus::BusError;
    ///
    /// assert!(BusError::InvalidCast { expected: "i32" }.is_validation());
    /// assert!(!BusError::NotHomeThread.is_validation());
    /// ```
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BusError::ArgumentNull { .. }
                | BusError::InvalidArgument { .. }
                | BusError::InvalidCast { .. }
        )
    }
}
