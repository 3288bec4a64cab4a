//! Server filters applied by [`Configuration::filter`](crate::Configuration::filter)
//!
//! Filters come from four places: the command line, custom filters added in
//! code, the `ROLES`/`HOSTS` environment variables, and the `filter`
//! configuration variable.

use rig_servers::{Filter, FilterKind, FilterValue, Server};
use rig_vars::Value;
use std::fmt;

/// Environment variable holding a role filter.
pub const ROLES_ENV: &str = "ROLES";

/// Environment variable holding a host filter.
pub const HOSTS_ENV: &str = "HOSTS";

/// A stage of the server filter chain.
pub trait ServerFilter {
    /// Reduce `servers`, keeping relative order.
    fn filter<'a>(&self, servers: Vec<&'a Server>) -> Vec<&'a Server>;
}

impl ServerFilter for Filter {
    fn filter<'a>(&self, servers: Vec<&'a Server>) -> Vec<&'a Server> {
        Filter::filter(self, servers)
    }
}

/// Adapts a closure into a [`ServerFilter`].
pub struct FnFilter<F> {
    func: F,
}

impl<F> FnFilter<F>
where
    F: for<'a> Fn(Vec<&'a Server>) -> Vec<&'a Server>,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> ServerFilter for FnFilter<F>
where
    F: for<'a> Fn(Vec<&'a Server>) -> Vec<&'a Server>,
{
    fn filter<'a>(&self, servers: Vec<&'a Server>) -> Vec<&'a Server> {
        (self.func)(servers)
    }
}

impl<F> fmt::Debug for FnFilter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnFilter")
    }
}

/// Role and host filter text taken from the environment.
///
/// Each value is handed to the filter as-is, so comma-separated lists are
/// split by the filter itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterEnv {
    pub roles: Option<String>,
    pub hosts: Option<String>,
}

impl FilterEnv {
    /// No environment filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `ROLES` and `HOSTS` from the process environment.
    ///
    /// Unset and empty variables are ignored.
    pub fn from_env() -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            roles: read(ROLES_ENV),
            hosts: read(HOSTS_ENV),
        }
    }

    pub fn with_roles(mut self, roles: impl Into<String>) -> Self {
        self.roles = Some(roles.into());
        self
    }

    pub fn with_hosts(mut self, hosts: impl Into<String>) -> Self {
        self.hosts = Some(hosts.into());
        self
    }

    /// The role filter, then the host filter, for whichever is set.
    pub(crate) fn filters(&self) -> rig_servers::Result<Vec<Filter>> {
        let mut filters = Vec::new();
        if let Some(roles) = &self.roles {
            filters.push(Filter::new(FilterKind::Role, [roles])?);
        }
        if let Some(hosts) = &self.hosts {
            filters.push(Filter::new(FilterKind::Host, [hosts])?);
        }
        Ok(filters)
    }
}

/// Filters declared by the `filter` variable, a map with optional `hosts`,
/// `roles`, `host` and `role` entries.
pub(crate) fn variable_filters(filter: &Value) -> rig_servers::Result<Vec<Filter>> {
    const ENTRIES: [(&str, FilterKind); 4] = [
        ("hosts", FilterKind::Host),
        ("roles", FilterKind::Role),
        ("host", FilterKind::Host),
        ("role", FilterKind::Role),
    ];

    let mut filters = Vec::new();
    for (entry, kind) in ENTRIES {
        match filter.get(entry) {
            None | Some(Value::Null) => {}
            Some(values) => filters.push(Filter::new(kind, FilterValue::from_value(values))?),
        }
    }
    Ok(filters)
}
