//! Per-server property container
//!
//! Writes merge into existing values by type instead of replacing them:
//! maps merge key-by-key, sets form a union and sequences concatenate.
//! Anything else is replaced outright.

use rig_vars::{Value, ValueMap, normalize_key};

/// Key/value properties of one server or role slice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    values: ValueMap,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a map, applying [`Properties::set`] per entry.
    pub fn from_map(map: ValueMap) -> Self {
        let mut props = Self::new();
        props.merge(map);
        props
    }

    /// Build from a JSON object. Non-object input yields empty properties.
    pub fn from_json(json: serde_json::Value) -> Self {
        match Value::from(json) {
            Value::Map(map) => Self::from_map(map),
            other => {
                tracing::warn!(value = %other, "Ignoring non-object properties");
                Self::new()
            }
        }
    }

    /// Store a value, merging it into a compatible existing value.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        let key = normalize_key(key);
        let value = value.into();
        match self.values.get_mut(&key) {
            Some(existing) => merge_value(existing, value),
            None => {
                self.values.insert(key, value);
            }
        }
    }

    /// Store a value, discarding whatever was there.
    pub fn replace(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(normalize_key(key), value.into());
    }

    /// Apply [`Properties::set`] for every entry, in enumeration order.
    pub fn merge<I, K>(&mut self, other: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        for (key, value) in other {
            self.set(key.as_ref(), value);
        }
    }

    /// The raw stored value.
    pub fn fetch(&self, key: &str) -> Option<&Value> {
        self.values.get(&normalize_key(key))
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(&normalize_key(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(&normalize_key(key))
    }

    /// A new container holding only the given keys.
    pub fn slice<S: AsRef<str>>(&self, keys: &[S]) -> Properties {
        let values = keys
            .iter()
            .map(|k| normalize_key(k.as_ref()))
            .filter_map(|k| self.values.get(&k).map(|v| (k, v.clone())))
            .collect();
        Properties { values }
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_map(&self) -> &ValueMap {
        &self.values
    }

    pub fn into_map(self) -> ValueMap {
        self.values
    }
}

impl From<ValueMap> for Properties {
    fn from(map: ValueMap) -> Self {
        Self::from_map(map)
    }
}

impl IntoIterator for Properties {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// Merge-on-write rule shared by every property write.
pub(crate) fn merge_value(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Map(old), Value::Map(new)) => old.extend(new),
        (Value::Set(old), Value::Set(new)) => old.extend(new),
        (Value::List(old), Value::List(new)) => old.extend(new),
        (slot, new) => *slot = new,
    }
}
