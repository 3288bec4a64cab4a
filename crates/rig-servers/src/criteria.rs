//! Extra selection criteria applied after role filtering

use crate::server::Server;
use rig_vars::{Value, ValueMap, normalize_key};
use std::fmt;
use std::sync::Arc;

type ServerFn = dyn Fn(&Server) -> bool + Send + Sync;
type ValueFn = dyn Fn(Option<&Value>) -> bool + Send + Sync;

/// A custom predicate over a server.
#[derive(Clone)]
pub enum Predicate {
    /// Truthiness of a server property
    Property(String),
    /// Arbitrary check
    Func(Arc<ServerFn>),
}

impl Predicate {
    pub fn evaluate(&self, server: &Server) -> bool {
        match self {
            Predicate::Property(key) => server.fetch(key).is_some_and(Value::is_truthy),
            Predicate::Func(func) => func(server),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Property(key) => f.debug_tuple("Property").field(key).finish(),
            Predicate::Func(_) => f.write_str("Func"),
        }
    }
}

/// One condition a server must satisfy.
#[derive(Clone)]
pub enum Criterion {
    /// The property equals a literal value
    Equals { key: String, value: Value },
    /// The property satisfies a one-argument check
    Matches { key: String, check: Arc<ValueFn> },
    /// The predicate holds
    Select(Predicate),
    /// The predicate does not hold
    Exclude(Predicate),
}

impl Criterion {
    pub fn holds(&self, server: &Server) -> bool {
        match self {
            Criterion::Equals { key, value } => server.fetch(key).unwrap_or(&Value::Null) == value,
            Criterion::Matches { key, check } => check(server.fetch(key)),
            Criterion::Select(predicate) => predicate.evaluate(server),
            Criterion::Exclude(predicate) => !predicate.evaluate(server),
        }
    }
}

impl fmt::Debug for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Equals { key, value } => f
                .debug_struct("Equals")
                .field("key", key)
                .field("value", value)
                .finish(),
            Criterion::Matches { key, .. } => {
                f.debug_struct("Matches").field("key", key).finish_non_exhaustive()
            }
            Criterion::Select(p) => f.debug_tuple("Select").field(p).finish(),
            Criterion::Exclude(p) => f.debug_tuple("Exclude").field(p).finish(),
        }
    }
}

/// Conjunction of criteria. Evaluation stops at the first failure.
#[derive(Debug, Clone, Default)]
pub struct Criteria {
    criteria: Vec<Criterion>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an options map.
    ///
    /// `filter`/`select` and `exclude` entries name a property whose
    /// truthiness is tested; every other entry is an equality check.
    pub fn from_map(options: &ValueMap) -> Self {
        let mut criteria = Self::new();
        for (key, value) in options {
            criteria = match normalize_key(key).as_str() {
                "filter" | "select" => criteria.select_property(&value.to_plain_string()),
                "exclude" => criteria.exclude_property(&value.to_plain_string()),
                _ => criteria.with(key, value.clone()),
            };
        }
        criteria
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.criteria.push(Criterion::Equals {
            key: normalize_key(key),
            value: value.into(),
        });
        self
    }

    pub fn matching<F>(mut self, key: &str, check: F) -> Self
    where
        F: Fn(Option<&Value>) -> bool + Send + Sync + 'static,
    {
        self.criteria.push(Criterion::Matches {
            key: normalize_key(key),
            check: Arc::new(check),
        });
        self
    }

    pub fn select<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Server) -> bool + Send + Sync + 'static,
    {
        self.criteria
            .push(Criterion::Select(Predicate::Func(Arc::new(predicate))));
        self
    }

    pub fn select_property(mut self, key: &str) -> Self {
        self.criteria
            .push(Criterion::Select(Predicate::Property(normalize_key(key))));
        self
    }

    pub fn exclude<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Server) -> bool + Send + Sync + 'static,
    {
        self.criteria
            .push(Criterion::Exclude(Predicate::Func(Arc::new(predicate))));
        self
    }

    pub fn exclude_property(mut self, key: &str) -> Self {
        self.criteria
            .push(Criterion::Exclude(Predicate::Property(normalize_key(key))));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Criterion> {
        self.criteria.iter()
    }
}
