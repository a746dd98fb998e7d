//! # Payload types
//!
//! Subscriptions are keyed by the payload's Rust type. [`PayloadType`] is the
//! runtime token for that key: it wraps a [`TypeId`] and keeps the type name
//! around for logs and error messages.
//!
//! Equality and hashing use the `TypeId` only.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Marker for values that can travel through the bus.
///
/// Payloads (and subscription state objects) may be handed to the home thread
/// from any thread, hence `Send + Sync`.
pub trait Payload: Any + Send + Sync {}

impl<T: Any + Send + Sync> Payload for T {}

/// Runtime identity of a payload type.
#[derive(Clone, Copy)]
pub struct PayloadType {
    id: TypeId,
    name: &'static str,
}

impl PayloadType {
    /// Returns the identity of `T`.
    ///
    /// # Example
    /// ```
    /// use weakbus::PayloadType;
    ///
    /// assert_eq!(PayloadType::of::<u32>(), PayloadType::of::<u32>());
    /// assert_ne!(PayloadType::of::<u32>(), PayloadType::of::<i32>());
    /// assert_eq!(PayloadType::of::<u32>().name(), "u32");
    /// ```
    pub fn of<T: Any + ?Sized>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Underlying [`TypeId`].
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name (diagnostics only).
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True if `value` is an instance of this type.
    pub fn matches(&self, value: &dyn Any) -> bool {
        value.type_id() == self.id
    }
}

impl PartialEq for PayloadType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PayloadType {}

impl Hash for PayloadType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PayloadType").field(&self.name).finish()
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
