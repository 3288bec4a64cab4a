//! Host and role filter strategies
//!
//! A filter criterion is a kind (`host` or `role`) plus a list of values.
//! [`Filter::new`] picks the strategy:
//!
//! 1. no values: [`EmptyFilter`], which admits nothing
//! 2. any value is the `all` token: [`NullFilter`], which admits everything
//! 3. otherwise [`HostFilter`] or [`RoleFilter`] by kind
//!
//! Host and role filters compile their values into one union pattern and
//! admit candidates matching it.

mod host;
mod role;

pub use host::HostFilter;
pub use role::RoleFilter;

use crate::server::Server;
use crate::{Error, Result};
use regex::Regex;
use rig_vars::{Value, normalize_key};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Token that disables filtering.
pub const ALL: &str = "all";

/// What a filter matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Host,
    Role,
}

impl FromStr for FilterKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_key(s).as_str() {
            "host" => Ok(FilterKind::Host),
            "role" => Ok(FilterKind::Role),
            _ => Err(Error::InvalidFilterType {
                kind: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterKind::Host => f.write_str("host"),
            FilterKind::Role => f.write_str("role"),
        }
    }
}

/// One filter value: text to interpret, or a precompiled pattern used as-is.
#[derive(Debug, Clone)]
pub enum FilterValue {
    Text(String),
    Pattern(Regex),
}

impl FilterValue {
    /// Flatten a configuration value into filter values.
    pub fn from_value(value: &Value) -> Vec<FilterValue> {
        match value {
            Value::Null => Vec::new(),
            Value::List(_) | Value::Set(_) => value
                .to_list()
                .iter()
                .flat_map(FilterValue::from_value)
                .collect(),
            other => vec![FilterValue::Text(other.to_plain_string())],
        }
    }

    fn is_all(&self) -> bool {
        matches!(self, FilterValue::Text(text) if normalize_key(text) == ALL)
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        FilterValue::Text(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        FilterValue::Text(s)
    }
}

impl From<&String> for FilterValue {
    fn from(s: &String) -> Self {
        FilterValue::Text(s.clone())
    }
}

impl From<Regex> for FilterValue {
    fn from(re: Regex) -> Self {
        FilterValue::Pattern(re)
    }
}

/// Anything a filter can be applied to.
pub trait Candidate {
    /// Text matched by host filters.
    fn host_label(&self) -> Cow<'_, str>;

    /// Roles matched by role filters; `None` for things that carry no roles.
    fn role_labels(&self) -> Option<&[String]> {
        None
    }
}

impl Candidate for Server {
    fn host_label(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.hostname())
    }

    fn role_labels(&self) -> Option<&[String]> {
        Some(self.roles())
    }
}

impl Candidate for str {
    fn host_label(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl Candidate for String {
    fn host_label(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

impl<T: Candidate + ?Sized> Candidate for &T {
    fn host_label(&self) -> Cow<'_, str> {
        (**self).host_label()
    }

    fn role_labels(&self) -> Option<&[String]> {
        (**self).role_labels()
    }
}

/// A matcher selected by [`Filter::new`].
pub trait FilterStrategy: fmt::Debug + Send + Sync {
    /// Strategy name, for diagnostics.
    fn name(&self) -> &'static str;

    /// Whether the candidate passes the filter.
    fn admits(&self, candidate: &dyn Candidate) -> bool;
}

/// Admits nothing: an empty criterion matches no candidates.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyFilter;

impl FilterStrategy for EmptyFilter {
    fn name(&self) -> &'static str {
        "empty"
    }

    fn admits(&self, _candidate: &dyn Candidate) -> bool {
        false
    }
}

/// Admits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullFilter;

impl FilterStrategy for NullFilter {
    fn name(&self) -> &'static str {
        "null"
    }

    fn admits(&self, _candidate: &dyn Candidate) -> bool {
        true
    }
}

/// A host or role criterion with its selected strategy.
#[derive(Debug, Clone)]
pub struct Filter {
    kind: FilterKind,
    strategy: Arc<dyn FilterStrategy>,
}

impl Filter {
    /// Build a filter, choosing the strategy from the values.
    pub fn new<I, V>(kind: FilterKind, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<FilterValue>,
    {
        let values: Vec<FilterValue> = values.into_iter().map(Into::into).collect();

        let strategy: Arc<dyn FilterStrategy> = if values.is_empty() {
            Arc::new(EmptyFilter)
        } else if values.iter().any(FilterValue::is_all) {
            Arc::new(NullFilter)
        } else {
            match kind {
                FilterKind::Host => Arc::new(HostFilter::new(values)?),
                FilterKind::Role => Arc::new(RoleFilter::new(values)?),
            }
        };

        tracing::debug!(%kind, strategy = strategy.name(), "Built filter");
        Ok(Self { kind, strategy })
    }

    /// Build a filter from a textual kind such as `"host"` or `":role"`.
    pub fn parse<I, V>(kind: &str, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<FilterValue>,
    {
        Self::new(kind.parse()?, values)
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn strategy(&self) -> &dyn FilterStrategy {
        self.strategy.as_ref()
    }

    pub fn admits(&self, candidate: &dyn Candidate) -> bool {
        self.strategy.admits(candidate)
    }

    /// The admitted subset, in input order.
    pub fn filter<'a, T, I>(&self, items: I) -> Vec<&'a T>
    where
        T: Candidate + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        items
            .into_iter()
            .filter(|item| self.strategy.admits(*item))
            .collect()
    }
}

/// Join per-value patterns into one alternation.
///
/// `None` stands for the union of nothing, which never matches.
pub(crate) fn union(patterns: &[String]) -> Result<Option<Regex>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let joined = patterns
        .iter()
        .map(|p| format!("(?:{})", p))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&joined)
        .map(Some)
        .map_err(|e| Error::InvalidPattern {
            pattern: joined,
            reason: e.to_string(),
        })
}

/// Anchored pattern matching `token` literally and completely.
pub(crate) fn exact(token: &str) -> String {
    format!("^{}$", regex::escape(token))
}
