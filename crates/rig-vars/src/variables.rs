//! The variable store
//!
//! Holds the variables assigned during a run via `set` and read back with
//! `fetch`. Besides storage it keeps the bookkeeping needed to point out user
//! mistakes such as misspelled or unused keys: which keys were read, which
//! were set while trusted, and every call site that assigned each key.

use crate::key::normalize_key;
use crate::location::SourceLocation;
use crate::slot::{Deferred, Resolved, Slot};
use crate::value::Value;
use crate::{Error, Result};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Variable that turns on tracing of every assignment when truthy.
pub const PRINT_CONFIG_VARIABLES: &str = "print_config_variables";

type ValidatorFn = dyn Fn(&str, &Value) -> std::result::Result<(), String> + Send + Sync;

/// A caller-supplied check run against resolved values.
#[derive(Clone)]
struct Validator(Arc<ValidatorFn>);

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validator")
    }
}

/// Fallback evaluated when a fetched key is absent.
pub type Fallback<'a> = Box<dyn FnOnce() -> Result<Slot> + 'a>;

/// Store construction options.
#[derive(Debug, Clone, Default)]
pub struct VariablesOptions {
    /// Source file fragments skipped when recording assignment locations;
    /// the nearest call site outside them is recorded instead.
    pub ignored_locations: Vec<String>,
}

/// Lazily-resolved, validated key/value store.
///
/// Read bookkeeping uses interior mutability so reads take `&self`; deferred
/// values receive the store as context and may read sibling keys. The store
/// is single-threaded: share it across threads only behind external
/// synchronization.
#[derive(Debug, Clone)]
pub struct Variables {
    values: HashMap<String, Slot>,
    order: Vec<String>,
    trusted_keys: Vec<String>,
    fetched_keys: RefCell<HashSet<String>>,
    locations: HashMap<String, Vec<SourceLocation>>,
    validators: HashMap<String, Vec<Validator>>,
    trusted: bool,
    options: VariablesOptions,
}

impl Default for Variables {
    fn default() -> Self {
        Self::with_options(VariablesOptions::default())
    }
}

impl Variables {
    /// Create an empty, trusted store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: VariablesOptions) -> Self {
        Self {
            values: HashMap::new(),
            order: Vec::new(),
            trusted_keys: Vec::new(),
            fetched_keys: RefCell::new(HashSet::new()),
            locations: HashMap::new(),
            validators: HashMap::new(),
            trusted: true,
            options,
        }
    }

    /// Create a store seeded with initial values.
    #[track_caller]
    pub fn from_values<I, K, V>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Slot>,
    {
        let mut vars = Self::new();
        vars.merge(values)?;
        Ok(vars)
    }

    pub fn options(&self) -> &VariablesOptions {
        &self.options
    }

    /// Assign a value, deferred computation or callable, replacing any
    /// previous slot outright.
    ///
    /// A concrete value is checked by the key's validators first and is not
    /// stored if any of them rejects it.
    #[track_caller]
    pub fn set(&mut self, key: &str, value: impl Into<Slot>) -> Result<()> {
        let location = SourceLocation::caller();
        let key = normalize_key(key);
        let slot = value.into();

        if let Slot::Value(value) = &slot {
            self.run_validators(&key, value)?;
        }

        if self.trusted && !self.trusted_keys.contains(&key) {
            self.trusted_keys.push(key.clone());
        }
        self.remember_location(&key, location);

        if self.values.insert(key.clone(), slot).is_none() {
            self.order.push(key.clone());
        }
        self.trace_set(&key);
        Ok(())
    }

    /// Assign from optional inputs the way the configuration DSL does.
    ///
    /// Supplying both a value and a deferred computation is an error; supplying
    /// neither stores `Null`.
    #[track_caller]
    pub fn set_from(
        &mut self,
        key: &str,
        value: Option<Slot>,
        deferred: Option<Deferred>,
    ) -> Result<()> {
        match (value, deferred) {
            (Some(_), Some(_)) => Err(Error::configuration(format!(
                "both a value and a deferred computation were given for {}",
                normalize_key(key)
            ))),
            (Some(value), None) => self.set(key, value),
            (None, Some(deferred)) => self.set(key, deferred),
            (None, None) => self.set(key, Value::Null),
        }
    }

    /// Read and resolve a key, marking it as used.
    ///
    /// An absent key resolves to `Null`.
    pub fn fetch(&self, key: &str) -> Result<Resolved> {
        self.fetch_with(key, None, None)
    }

    /// Read a key, falling back to `default` (itself resolved) when absent.
    pub fn fetch_or(&self, key: &str, default: impl Into<Slot>) -> Result<Resolved> {
        self.fetch_with(key, Some(default.into()), None)
    }

    /// Read a key, evaluating `fallback` when absent.
    pub fn fetch_or_else<F>(&self, key: &str, fallback: F) -> Result<Resolved>
    where
        F: FnOnce() -> Result<Slot>,
    {
        self.fetch_with(key, None, Some(Box::new(fallback)))
    }

    /// Read a key with an optional default or fallback, but not both.
    pub fn fetch_with(
        &self,
        key: &str,
        default: Option<Slot>,
        fallback: Option<Fallback<'_>>,
    ) -> Result<Resolved> {
        let key = normalize_key(key);
        self.fetched_keys.borrow_mut().insert(key.clone());
        self.lookup(&key, default, fallback)
    }

    /// Read a key that must have been set.
    pub fn fetch_required(&self, key: &str) -> Result<Resolved> {
        if !self.has_key(key) {
            return Err(Error::KeyNotFound {
                key: normalize_key(key),
            });
        }
        self.fetch(key)
    }

    /// Read a key as a concrete value.
    ///
    /// Absent keys and unresolved callables read as `Null`.
    pub fn fetch_value(&self, key: &str) -> Result<Value> {
        Ok(self.fetch(key)?.value().unwrap_or_default())
    }

    /// Resolve a key without marking it as used.
    pub fn peek(&self, key: &str) -> Result<Resolved> {
        self.lookup(&normalize_key(key), None, None)
    }

    /// Resolve a key without marking it as used, with a default.
    pub fn peek_or(&self, key: &str, default: impl Into<Slot>) -> Result<Resolved> {
        self.lookup(&normalize_key(key), Some(default.into()), None)
    }

    /// The raw slot stored under a key, without resolution.
    pub fn slot(&self, key: &str) -> Option<&Slot> {
        self.values.get(&normalize_key(key))
    }

    /// Remove a key. Read, trust and location history are kept.
    pub fn delete(&mut self, key: &str) -> Option<Slot> {
        let key = normalize_key(key);
        let removed = self.values.remove(&key);
        if removed.is_some() {
            self.order.retain(|k| k != &key);
        }
        removed
    }

    /// Assign every entry of `other`, overwriting per key.
    ///
    /// There is no structural merge: a map value replaces the existing map.
    #[track_caller]
    pub fn merge<I, K, V>(&mut self, other: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Slot>,
    {
        for (key, value) in other {
            self.set(key.as_ref(), value)?;
        }
        Ok(())
    }

    /// Register a validator for a key.
    ///
    /// Validators accumulate and run in registration order on every read of
    /// the key, after deferred values are resolved.
    pub fn validate<F>(&mut self, key: &str, validator: F)
    where
        F: Fn(&str, &Value) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.validators
            .entry(normalize_key(key))
            .or_default()
            .push(Validator(Arc::new(validator)));
    }

    /// Keys in assignment order.
    pub fn keys(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.values.contains_key(&normalize_key(key))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keys that have been set but never fetched.
    pub fn unused_keys(&self) -> Vec<String> {
        let fetched = self.fetched_keys.borrow();
        self.order
            .iter()
            .filter(|k| !fetched.contains(*k))
            .cloned()
            .collect()
    }

    /// Keys that were set while the store was trusted.
    pub fn trusted_keys(&self) -> Vec<String> {
        self.trusted_keys.clone()
    }

    /// Keys currently set that were never set while trusted.
    pub fn untrusted_keys(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|k| !self.trusted_keys.contains(k))
            .cloned()
            .collect()
    }

    /// Every recorded call site that assigned `key`, oldest first.
    pub fn source_locations(&self, key: &str) -> Option<&[SourceLocation]> {
        self.locations.get(&normalize_key(key)).map(Vec::as_slice)
    }

    pub fn is_trusted(&self) -> bool {
        self.trusted
    }

    /// Enter untrusted mode until the returned guard is dropped.
    ///
    /// The previous mode is restored on every exit path, including unwinding.
    pub fn untrusted(&mut self) -> UntrustedGuard<'_> {
        let previous = self.trusted;
        self.trusted = false;
        UntrustedGuard {
            vars: self,
            previous,
        }
    }

    /// Run `f` with the store in untrusted mode.
    pub fn with_untrusted<R>(&mut self, f: impl FnOnce(&mut Variables) -> R) -> R {
        let mut guard = self.untrusted();
        f(&mut guard)
    }

    fn lookup(
        &self,
        key: &str,
        default: Option<Slot>,
        fallback: Option<Fallback<'_>>,
    ) -> Result<Resolved> {
        if default.is_some() && fallback.is_some() {
            return Err(Error::configuration(format!(
                "both a default and a fallback were given when fetching {}",
                key
            )));
        }

        let Some(slot) = self.values.get(key).cloned() else {
            let slot = match (default, fallback) {
                (Some(default), _) => default,
                (None, Some(fallback)) => fallback()?,
                (None, None) => Slot::Value(Value::Null),
            };
            return self.resolve(slot);
        };

        let resolved = self.resolve(slot)?;
        if let Resolved::Value(value) = &resolved {
            self.run_validators(key, value)?;
        }
        Ok(resolved)
    }

    /// Evaluate deferred values until something concrete (or a one-argument
    /// callable) remains.
    fn resolve(&self, mut slot: Slot) -> Result<Resolved> {
        loop {
            slot = match slot {
                Slot::Value(value) => return Ok(Resolved::Value(value)),
                Slot::Callable(callable) => return Ok(Resolved::Callable(callable)),
                Slot::Deferred(deferred) => deferred.evaluate(self)?,
            };
        }
    }

    fn run_validators(&self, key: &str, value: &Value) -> Result<()> {
        let Some(validators) = self.validators.get(key) else {
            return Ok(());
        };
        for Validator(check) in validators {
            check(key, value).map_err(|message| Error::Validation {
                key: key.to_string(),
                message,
            })?;
        }
        Ok(())
    }

    fn remember_location(&mut self, key: &str, location: SourceLocation) {
        let Some(location) = location.first_unignored(&self.options.ignored_locations) else {
            tracing::debug!(key = %key, "No call site outside ignored locations");
            return;
        };
        self.locations
            .entry(key.to_string())
            .or_default()
            .push(location);
    }

    fn trace_set(&self, key: &str) {
        let enabled = self
            .peek(PRINT_CONFIG_VARIABLES)
            .ok()
            .and_then(Resolved::value)
            .is_some_and(|v| v.is_truthy());
        if !enabled {
            return;
        }
        match self.values.get(key) {
            Some(Slot::Value(value)) => {
                tracing::info!(key = %key, value = %value, "Config variable set")
            }
            Some(other) => tracing::info!(key = %key, slot = ?other, "Config variable set"),
            None => {}
        }
    }
}

/// Scope during which assignments are recorded as untrusted.
///
/// Dereferences to the store; dropping it restores the previous trust mode.
pub struct UntrustedGuard<'a> {
    vars: &'a mut Variables,
    previous: bool,
}

impl Deref for UntrustedGuard<'_> {
    type Target = Variables;

    fn deref(&self) -> &Variables {
        self.vars
    }
}

impl DerefMut for UntrustedGuard<'_> {
    fn deref_mut(&mut self) -> &mut Variables {
        self.vars
    }
}

impl Drop for UntrustedGuard<'_> {
    fn drop(&mut self) {
        self.vars.trusted = self.previous;
    }
}
