//! Role filter

use super::{Candidate, FilterStrategy, FilterValue, exact, union};
use crate::Result;
use regex::Regex;

/// Admits candidates holding at least one role that matches the filter values.
///
/// Every text value is split on commas. A value wrapped in slashes
/// (`/^app/`) is a regular expression; anything else must match a role name
/// exactly. Candidates without roles, such as bare host names, never match.
#[derive(Debug, Clone)]
pub struct RoleFilter {
    pattern: Option<Regex>,
}

impl RoleFilter {
    pub fn new(values: Vec<FilterValue>) -> Result<Self> {
        let patterns: Vec<String> = values
            .into_iter()
            .flat_map(|value| match value {
                FilterValue::Text(text) => text
                    .split(',')
                    .filter(|t| !t.is_empty())
                    .map(|t| FilterValue::Text(t.to_string()))
                    .collect(),
                other => vec![other],
            })
            .map(|value| match value {
                FilterValue::Pattern(re) => re.as_str().to_string(),
                FilterValue::Text(text) => match delimited(&text) {
                    Some(raw) => raw.to_string(),
                    None => exact(&rig_vars::normalize_key(&text)),
                },
            })
            .collect();

        Ok(Self {
            pattern: union(&patterns)?,
        })
    }

    pub fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }
}

/// Contents of a `/.../` value.
fn delimited(text: &str) -> Option<&str> {
    text.strip_prefix('/')
        .and_then(|t| t.strip_suffix('/'))
        .filter(|inner| !inner.is_empty())
}

impl FilterStrategy for RoleFilter {
    fn name(&self) -> &'static str {
        "role"
    }

    fn admits(&self, candidate: &dyn Candidate) -> bool {
        let (Some(re), Some(roles)) = (self.pattern.as_ref(), candidate.role_labels()) else {
            return false;
        };
        roles.iter().any(|role| re.is_match(role))
    }
}
