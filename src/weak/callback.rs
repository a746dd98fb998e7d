//! # WeakCallback: a callable that does not keep its receiver alive.
//!
//! A [`WeakCallback`] pairs a function pointer with an optional receiver. The
//! receiver is observed through a [`WeakHolder`], so a subscription never extends
//! the lifetime of the object it was registered for.
//!
//! ## Shapes
//! ```text
//!   static            fn(&T) -> R              args: [payload]
//!   static + state    fn(&T, &S) -> R          args: [payload, state]
//!   bound             fn(&O, &T) -> R          receiver: Weak<O>, args: [payload]
//!   bound + state     fn(&O, &T, &S) -> R      receiver: Weak<O>, args: [payload, state]
//! ```
//!
//! ## Rules
//! - Static callables are always alive (until disposed).
//! - Bound callables are alive while the receiver's `Arc` has strong owners.
//! - `invoke` on a disposed or dead callback is a no-op returning
//!   [`Invocation::Disposed`] / [`Invocation::NotAlive`], never an error.
//! - Wrong arity or argument types is a caller bug and fails with
//!   [`BusError::ArgumentMismatch`].
//! - Identity ([`CallbackId`]) combines the function address and the receiver
//!   address, so the same method bound to two receivers is two subscriptions.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::BusError;
use crate::payload::PayloadType;
use crate::weak::WeakHolder;

type Receiver = dyn Any + Send + Sync;
type Thunk<R> = Box<dyn Fn(Option<&Receiver>, &[&dyn Any]) -> Result<R, BusError> + Send + Sync>;

/// Stable identity of a callable: function address in the high half, receiver
/// address (or `0` for static callables) in the low half.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(u128);

impl CallbackId {
    fn new(function: usize, receiver: usize) -> Self {
        Self(((function as u128) << 64) | receiver as u128)
    }

    /// Raw integer value.
    pub fn as_u128(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#034x}", self.0)
    }
}

/// Declared argument types of a callable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature {
    /// Type of the first argument (the payload).
    pub payload: PayloadType,
    /// Type of the optional second argument (the state object).
    pub state: Option<PayloadType>,
}

impl Signature {
    /// Number of arguments the callable expects.
    pub fn arity(&self) -> usize {
        if self.state.is_some() {
            2
        } else {
            1
        }
    }
}

/// Outcome of [`WeakCallback::invoke`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation<R> {
    /// The callable ran and returned a value.
    Success(R),
    /// The receiver is gone; nothing was called.
    NotAlive,
    /// The callback was disposed; nothing was called.
    Disposed,
}

impl<R> Invocation<R> {
    /// Returns the value for [`Invocation::Success`].
    pub fn value(self) -> Option<R> {
        match self {
            Invocation::Success(v) => Some(v),
            Invocation::NotAlive | Invocation::Disposed => None,
        }
    }
}

/// Callable holding its receiver weakly.
pub struct WeakCallback<R> {
    id: CallbackId,
    signature: Signature,
    receiver: Option<WeakHolder<Receiver>>,
    thunk: Thunk<R>,
    disposed: AtomicBool,
}

impl<R: 'static> WeakCallback<R> {
    /// Wraps a receiver-less function taking the payload.
    pub fn from_fn<T: Any>(f: fn(&T) -> R) -> Self {
        Self {
            id: CallbackId::new(f as usize, 0),
            signature: Signature {
                payload: PayloadType::of::<T>(),
                state: None,
            },
            receiver: None,
            thunk: thunk(move |_, args| Ok(f(arg::<T>(args, 0)?))),
            disposed: AtomicBool::new(false),
        }
    }

    /// Wraps a receiver-less function taking the payload and a state object.
    pub fn from_fn_with_state<T: Any, S: Any>(f: fn(&T, &S) -> R) -> Self {
        Self {
            id: CallbackId::new(f as usize, 0),
            signature: Signature {
                payload: PayloadType::of::<T>(),
                state: Some(PayloadType::of::<S>()),
            },
            receiver: None,
            thunk: thunk(move |_, args| Ok(f(arg::<T>(args, 0)?, arg::<S>(args, 1)?))),
            disposed: AtomicBool::new(false),
        }
    }

    /// Binds `method` to `receiver` without taking ownership of it.
    pub fn bind<O, T>(receiver: &Arc<O>, method: fn(&O, &T) -> R) -> Self
    where
        O: Any + Send + Sync,
        T: Any,
    {
        Self {
            id: CallbackId::new(method as usize, receiver_addr(receiver)),
            signature: Signature {
                payload: PayloadType::of::<T>(),
                state: None,
            },
            receiver: Some(erase(receiver)),
            thunk: thunk(move |recv, args| {
                Ok(method(resolve::<O>(recv)?, arg::<T>(args, 0)?))
            }),
            disposed: AtomicBool::new(false),
        }
    }

    /// Binds a state-taking `method` to `receiver` without taking ownership of it.
    pub fn bind_with_state<O, T, S>(receiver: &Arc<O>, method: fn(&O, &T, &S) -> R) -> Self
    where
        O: Any + Send + Sync,
        T: Any,
        S: Any,
    {
        Self {
            id: CallbackId::new(method as usize, receiver_addr(receiver)),
            signature: Signature {
                payload: PayloadType::of::<T>(),
                state: Some(PayloadType::of::<S>()),
            },
            receiver: Some(erase(receiver)),
            thunk: thunk(move |recv, args| {
                Ok(method(
                    resolve::<O>(recv)?,
                    arg::<T>(args, 0)?,
                    arg::<S>(args, 1)?,
                ))
            }),
            disposed: AtomicBool::new(false),
        }
    }
}

impl<R> WeakCallback<R> {
    /// Identity used for registration lookups.
    pub fn id(&self) -> CallbackId {
        self.id
    }

    /// Declared argument types.
    pub fn signature(&self) -> Signature {
        self.signature
    }

    /// True if the callable has no receiver.
    pub fn is_static(&self) -> bool {
        self.receiver.is_none()
    }

    /// Static callables are alive until disposed; bound ones while their receiver is.
    pub fn is_alive(&self) -> bool {
        if self.is_disposed() {
            return false;
        }
        match &self.receiver {
            None => true,
            Some(holder) => holder.is_alive(),
        }
    }

    /// True once [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Invokes the callable with `args` (payload first, optional state second).
    ///
    /// The receiver is re-resolved on every call and held strongly only for the
    /// duration of the call.
    pub fn invoke(&self, args: &[&dyn Any]) -> Result<Invocation<R>, BusError> {
        if self.is_disposed() {
            return Ok(Invocation::Disposed);
        }
        if args.len() != self.signature.arity() {
            return Err(BusError::mismatch(format!(
                "callable takes {} argument(s), {} passed",
                self.signature.arity(),
                args.len()
            )));
        }
        match &self.receiver {
            None => (self.thunk)(None, args).map(Invocation::Success),
            Some(holder) => match holder.upgrade() {
                Some(receiver) => (self.thunk)(Some(&*receiver), args).map(Invocation::Success),
                None => Ok(Invocation::NotAlive),
            },
        }
    }

    /// Releases the receiver reference and marks the callback disposed. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(holder) = &self.receiver {
            holder.dispose();
        }
    }
}

impl<R> fmt::Debug for WeakCallback<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakCallback")
            .field("id", &self.id)
            .field("signature", &self.signature)
            .field("static", &self.is_static())
            .field("alive", &self.is_alive())
            .finish()
    }
}

fn thunk<R, F>(f: F) -> Thunk<R>
where
    F: Fn(Option<&Receiver>, &[&dyn Any]) -> Result<R, BusError> + Send + Sync + 'static,
{
    Box::new(f)
}

fn erase<O: Any + Send + Sync>(receiver: &Arc<O>) -> WeakHolder<Receiver> {
    let erased: Arc<Receiver> = receiver.clone();
    WeakHolder::new(&erased)
}

fn receiver_addr<O>(receiver: &Arc<O>) -> usize {
    Arc::as_ptr(receiver) as *const () as usize
}

fn resolve<O: Any>(receiver: Option<&Receiver>) -> Result<&O, BusError> {
    receiver
        .and_then(|r| r.downcast_ref::<O>())
        .ok_or_else(|| BusError::mismatch(format!("receiver is not {}", type_name::<O>())))
}

fn arg<'a, A: Any>(args: &[&'a dyn Any], index: usize) -> Result<&'a A, BusError> {
    args.get(index)
        .copied()
        .and_then(|a| a.downcast_ref::<A>())
        .ok_or_else(|| {
            BusError::mismatch(format!("argument #{index} is not {}", type_name::<A>()))
        })
}
