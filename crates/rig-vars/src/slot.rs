//! Stored slots and lazily-evaluated values
//!
//! A slot holds either a concrete [`Value`], a [`Deferred`] computation that
//! takes no caller-supplied argument, or a one-argument [`Callable`] that the
//! store hands back to the caller unresolved.

use crate::Result;
use crate::value::{Value, ValueMap};
use crate::variables::Variables;
use std::fmt;
use std::sync::Arc;

type DeferredFn = dyn Fn(&Variables) -> Result<Slot> + Send + Sync;
type CallableFn = dyn Fn(&Value) -> Result<Value> + Send + Sync;

/// A computation evaluated at read time.
///
/// The store passes itself as read context so a deferred value can depend on
/// sibling keys. The computation may yield another slot, including another
/// deferred value; the store keeps evaluating until it reaches something that
/// is not deferred.
#[derive(Clone)]
pub struct Deferred {
    func: Arc<DeferredFn>,
    cacheable: bool,
}

impl Deferred {
    /// A cacheable deferred value.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Variables) -> Result<Slot> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
            cacheable: true,
        }
    }

    /// A deferred value that downstream consumers must not memoize.
    pub fn no_cache<F>(func: F) -> Self
    where
        F: Fn(&Variables) -> Result<Slot> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
            cacheable: false,
        }
    }

    /// Alias of [`Deferred::no_cache`].
    pub fn dont_cache<F>(func: F) -> Self
    where
        F: Fn(&Variables) -> Result<Slot> + Send + Sync + 'static,
    {
        Self::no_cache(func)
    }

    /// Whether downstream consumers may memoize the result.
    ///
    /// The store itself never caches.
    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    pub(crate) fn evaluate(&self, vars: &Variables) -> Result<Slot> {
        (self.func)(vars)
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("cacheable", &self.cacheable)
            .finish_non_exhaustive()
    }
}

/// A stored function of one argument.
#[derive(Clone)]
pub struct Callable {
    func: Arc<CallableFn>,
}

impl Callable {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
        }
    }

    /// Invoke with an explicit argument.
    pub fn call(&self, arg: &Value) -> Result<Value> {
        (self.func)(arg)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable").finish_non_exhaustive()
    }
}

/// Contents of one variable.
#[derive(Debug, Clone)]
pub enum Slot {
    Value(Value),
    Deferred(Deferred),
    Callable(Callable),
}

impl Slot {
    /// Shorthand for a cacheable deferred slot.
    pub fn deferred<F>(func: F) -> Self
    where
        F: Fn(&Variables) -> Result<Slot> + Send + Sync + 'static,
    {
        Slot::Deferred(Deferred::new(func))
    }

    /// Shorthand for a one-argument callable slot.
    pub fn callable<F>(func: F) -> Self
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        Slot::Callable(Callable::new(func))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Slot::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl From<Deferred> for Slot {
    fn from(d: Deferred) -> Self {
        Slot::Deferred(d)
    }
}

impl From<Callable> for Slot {
    fn from(c: Callable) -> Self {
        Slot::Callable(c)
    }
}

macro_rules! slot_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Slot {
                fn from(v: $ty) -> Self {
                    Slot::Value(Value::from(v))
                }
            }
        )*
    };
}

slot_from_value!(
    Value,
    &str,
    String,
    bool,
    i64,
    i32,
    ValueMap,
    Vec<Value>,
    Vec<&str>,
    serde_json::Value,
);

/// Outcome of resolving a slot.
///
/// Deferred values never survive resolution; a one-argument callable does.
#[derive(Debug, Clone)]
pub enum Resolved {
    Value(Value),
    Callable(Callable),
}

impl Resolved {
    /// The concrete value, if resolution produced one.
    pub fn value(self) -> Option<Value> {
        match self {
            Resolved::Value(v) => Some(v),
            Resolved::Callable(_) => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Resolved::Value(v) => Some(v),
            Resolved::Callable(_) => None,
        }
    }

    /// The unresolved callable, if resolution produced one.
    pub fn callable(self) -> Option<Callable> {
        match self {
            Resolved::Callable(c) => Some(c),
            Resolved::Value(_) => None,
        }
    }
}

impl PartialEq<Value> for Resolved {
    fn eq(&self, other: &Value) -> bool {
        self.as_value() == Some(other)
    }
}
