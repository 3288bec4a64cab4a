//! Hostname filter

use super::{Candidate, FilterStrategy, FilterValue, exact, union};
use crate::Result;
use regex::Regex;
use std::sync::LazyLock;

/// A single hostname-like token.
static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-A-Za-z0-9.]+$").expect("Invalid host token regex"));

/// Comma-joined hostname-like tokens.
static TOKEN_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-A-Za-z0-9.]+(,[-A-Za-z0-9.]+)*$").expect("Invalid host token list regex")
});

/// Admits candidates whose hostname matches any of the filter values.
///
/// A plain token such as `web1` must match the whole hostname. Any other
/// text is an unanchored regular expression, so `web.*` matches `web1` and
/// `web10` alike. Comma-joined tokens are split first.
#[derive(Debug, Clone)]
pub struct HostFilter {
    pattern: Option<Regex>,
}

impl HostFilter {
    pub fn new(values: Vec<FilterValue>) -> Result<Self> {
        let patterns: Vec<String> = values
            .into_iter()
            .flat_map(|value| match value {
                FilterValue::Text(text) if TOKEN_LIST.is_match(&text) => text
                    .split(',')
                    .map(|t| FilterValue::Text(t.to_string()))
                    .collect(),
                other => vec![other],
            })
            .map(|value| match value {
                FilterValue::Pattern(re) => re.as_str().to_string(),
                FilterValue::Text(text) if TOKEN.is_match(&text) => exact(&text),
                FilterValue::Text(text) => text,
            })
            .collect();

        Ok(Self {
            pattern: union(&patterns)?,
        })
    }

    /// The compiled union pattern, if any value was given.
    pub fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }
}

impl FilterStrategy for HostFilter {
    fn name(&self) -> &'static str {
        "host"
    }

    fn admits(&self, candidate: &dyn Candidate) -> bool {
        self.pattern
            .as_ref()
            .is_some_and(|re| re.is_match(&candidate.host_label()))
    }
}
