//! Server registry
//!
//! Servers are de-duplicated by hostname and port and kept in insertion
//! order, so "first match" queries such as primary selection are stable.

use crate::criteria::Criteria;
use crate::filter::{Filter, FilterKind, FilterValue};
use crate::properties::Properties;
use crate::server::{Server, ServerKey, port_from_value};
use crate::Result;
use rig_vars::{Value, ValueMap, normalize_key};
use std::collections::HashMap;
use std::ops::Deref;

/// A role-tagged property record produced by [`Servers::role_properties_for`].
pub type PropertyRecord = ValueMap;

/// Insertion-ordered collection of unique servers.
#[derive(Debug, Clone, Default)]
pub struct Servers {
    servers: Vec<Server>,
    index: HashMap<ServerKey, usize>,
}

impl Servers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a host, or update the existing server with the same hostname
    /// and port.
    ///
    /// On update the user is replaced when the host spec names one, and the
    /// properties are merged with the usual merge-on-write rules.
    pub fn add_host(
        &mut self,
        spec: &str,
        properties: Properties,
    ) -> Result<RegisteredServer<'_>> {
        let mut candidate = Server::parse(spec)?;
        if let Some(port) = properties.fetch("port") {
            candidate.set_port(port_from_value(port)?);
        }

        let key = candidate.key();
        if let Some(&position) = self.index.get(&key) {
            let existing = &mut self.servers[position];
            if let Some(user) = candidate.user() {
                existing.set_user(user);
            }
            existing.apply(properties, true)?;
            tracing::debug!(host = %key.hostname, port = ?key.port, "Updated server");
            return Ok(RegisteredServer(existing));
        }

        candidate.with(properties)?;
        let position = self.servers.len();
        self.servers.push(candidate);
        self.index.insert(key.clone(), position);
        tracing::debug!(host = %key.hostname, port = ?key.port, "Added server");
        Ok(RegisteredServer(&mut self.servers[position]))
    }

    /// Assign `role` to every host, each receiving its own copy of `options`.
    pub fn add_role<I, S>(&mut self, role: &str, hosts: I, options: &Properties) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let role = normalize_key(role);
        for host in hosts {
            let mut props = options.clone();
            props.replace("roles", role.as_str());
            self.add_host(host.as_ref(), props)?;
        }
        Ok(())
    }

    /// Servers having any role matching `names`, narrowed by `criteria`.
    pub fn roles_for<I, V>(&self, names: I, criteria: &Criteria) -> Result<Vec<&Server>>
    where
        I: IntoIterator<Item = V>,
        V: Into<FilterValue>,
    {
        let filter = Filter::new(FilterKind::Role, names)?;
        Ok(filter
            .filter(&self.servers)
            .into_iter()
            .filter(|server| server.select(criteria))
            .collect())
    }

    /// Call `f` once per role-property entry of every matching server.
    ///
    /// A role's properties may be a single map or a list of maps; a role with
    /// no properties yields one call with `None`.
    pub fn each_role_properties<S, F>(&self, names: &[S], mut f: F) -> Result<()>
    where
        S: AsRef<str>,
        F: FnMut(&Server, &str, Option<&Value>),
    {
        let requested = requested_roles(names);
        for server in self.roles_for(names.iter().map(|n| n.as_ref()), &Criteria::new())? {
            for role in requested.iter().filter(|r| server.has_role(r)) {
                match server.fetch(role) {
                    None => f(server, role, None),
                    Some(Value::List(entries)) => {
                        for entry in entries {
                            f(server, role, Some(entry));
                        }
                    }
                    Some(props) => f(server, role, Some(props)),
                }
            }
        }
        Ok(())
    }

    /// Role-scoped property records tagged with `role` and `hostname`.
    ///
    /// With `include_non_role_props`, the server's non-role properties sit
    /// underneath each record and lose to role-specific keys. Identical
    /// records collapse.
    pub fn role_properties_for<S: AsRef<str>>(
        &self,
        names: &[S],
        include_non_role_props: bool,
    ) -> Result<Vec<PropertyRecord>> {
        let mut records: Vec<PropertyRecord> = Vec::new();
        self.each_role_properties(names, |server, role, props| {
            let mut record = if include_non_role_props {
                server.non_role_properties().into_map()
            } else {
                PropertyRecord::new()
            };
            match props {
                Some(Value::Map(entries)) => {
                    record.extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())))
                }
                Some(other) => tracing::warn!(
                    host = %server.hostname(),
                    role = %role,
                    value = %other,
                    "Ignoring role properties that are not a map"
                ),
                None => {}
            }
            record.insert("role".to_string(), Value::from(role));
            record.insert("hostname".to_string(), Value::from(server.hostname()));
            if !records.contains(&record) {
                records.push(record);
            }
        })?;
        Ok(records)
    }

    /// [`Servers::role_properties_for`] including non-role properties.
    pub fn all_properties_for<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<PropertyRecord>> {
        self.role_properties_for(names, true)
    }

    /// The server flagged `primary` among those with `role`, else the first.
    pub fn fetch_primary(&self, role: &str) -> Result<Option<&Server>> {
        let hosts = self.roles_for([role], &Criteria::new())?;
        Ok(hosts
            .iter()
            .find(|server| server.primary())
            .or_else(|| hosts.first())
            .copied())
    }

    pub fn get(&self, key: &ServerKey) -> Option<&Server> {
        self.index.get(key).map(|&i| &self.servers[i])
    }

    pub fn get_mut(&mut self, key: &ServerKey) -> Option<RegisteredServer<'_>> {
        self.index
            .get(key)
            .map(|&i| RegisteredServer(&mut self.servers[i]))
    }

    /// Look up a server by hostname on the default port.
    pub fn find(&self, hostname: &str) -> Option<&Server> {
        self.get(&ServerKey::new(normalize_key(hostname), None))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Server> {
        self.servers.iter()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

/// Mutable access to a server owned by a [`Servers`] registry.
///
/// Hostname and port key the registry, so they stay fixed; everything else
/// can change. Reads go through to the [`Server`].
#[derive(Debug)]
pub struct RegisteredServer<'a>(&'a mut Server);

impl RegisteredServer<'_> {
    /// Apply properties as [`Server::with`] does. A `port` other than the
    /// current one is refused.
    pub fn with(&mut self, properties: Properties) -> Result<&mut Self> {
        self.0.apply(properties, true)?;
        Ok(self)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.0.set(key, value);
        self
    }

    pub fn set_user(&mut self, user: impl Into<String>) -> &mut Self {
        self.0.set_user(user);
        self
    }

    pub fn add_role(&mut self, role: &str) -> &mut Self {
        self.0.add_role(role);
        self
    }

    pub fn add_roles<I, S>(&mut self, roles: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.0.add_roles(roles);
        self
    }

    pub fn properties_mut(&mut self) -> &mut Properties {
        self.0.properties_mut()
    }
}

impl Deref for RegisteredServer<'_> {
    type Target = Server;

    fn deref(&self) -> &Server {
        self.0
    }
}

impl<'a> IntoIterator for &'a Servers {
    type Item = &'a Server;
    type IntoIter = std::slice::Iter<'a, Server>;

    fn into_iter(self) -> Self::IntoIter {
        self.servers.iter()
    }
}

fn requested_roles<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut roles: Vec<String> = Vec::new();
    for name in names {
        let role = normalize_key(name.as_ref());
        if !roles.contains(&role) {
            roles.push(role);
        }
    }
    roles
}
