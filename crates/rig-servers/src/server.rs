//! A single addressable host
//!
//! A server's identity is its hostname and port; the login user is carried
//! along but does not take part in equality. Role names double as property
//! keys whose values hold role-scoped overrides.

use crate::criteria::Criteria;
use crate::properties::Properties;
use crate::{Error, Result};
use rig_vars::{Value, normalize_key};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Property keys routed to the server's identity and role set by [`Server::with`].
const ROLES_KEY: &str = "roles";
const USER_KEY: &str = "user";
const PORT_KEY: &str = "port";

/// Registry identity of a server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServerKey {
    pub hostname: String,
    pub port: Option<u16>,
}

impl ServerKey {
    pub fn new(hostname: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            hostname: hostname.into(),
            port,
        }
    }
}

/// A deployment target.
#[derive(Debug, Clone)]
pub struct Server {
    hostname: String,
    port: Option<u16>,
    user: Option<String>,
    roles: Vec<String>,
    properties: Properties,
}

impl Server {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            port: None,
            user: None,
            roles: Vec::new(),
            properties: Properties::new(),
        }
    }

    /// Parse `user@host:port`, `host:port`, `[v6addr]:port` or a bare host.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = normalize_key(spec);
        let invalid = |reason: &str| Error::InvalidHostSpec {
            spec: spec.clone(),
            reason: reason.to_string(),
        };

        let (user, rest) = match spec.rsplit_once('@') {
            Some((user, rest)) if !user.is_empty() => (Some(user.to_string()), rest),
            Some(_) => return Err(invalid("empty user")),
            None => (None, spec.as_str()),
        };

        let (host, port) = if let Some(bracketed) = rest.strip_prefix('[') {
            let (host, after) = bracketed
                .split_once(']')
                .ok_or_else(|| invalid("unterminated IPv6 address"))?;
            match after {
                "" => (host, None),
                _ => match after.strip_prefix(':') {
                    Some(port) => (host, Some(port)),
                    None => return Err(invalid("unexpected text after IPv6 address")),
                },
            }
        } else if rest.matches(':').count() == 1 {
            let (host, port) = rest.split_once(':').ok_or_else(|| invalid("missing port"))?;
            (host, Some(port))
        } else {
            (rest, None)
        };

        if host.is_empty() {
            return Err(invalid("empty hostname"));
        }
        let port = port
            .map(|p| p.parse::<u16>().map_err(|_| invalid("port is not a number")))
            .transpose()?;

        Ok(Self {
            hostname: host.to_string(),
            port,
            user,
            roles: Vec::new(),
            properties: Properties::new(),
        })
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn set_port(&mut self, port: Option<u16>) {
        self.port = port;
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn set_user(&mut self, user: impl Into<String>) {
        self.user = Some(user.into());
    }

    pub fn key(&self) -> ServerKey {
        ServerKey::new(self.hostname.clone(), self.port)
    }

    /// Add a role. Adding a role the server already has is a no-op.
    pub fn add_role(&mut self, role: &str) -> &mut Self {
        let role = normalize_key(role);
        if !self.roles.contains(&role) {
            self.roles.push(role);
        }
        self
    }

    pub fn add_roles<I, S>(&mut self, roles: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for role in roles {
            self.add_role(role.as_ref());
        }
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(&normalize_key(role))
    }

    /// Roles in the order they were first added.
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    pub fn fetch(&self, key: &str) -> Option<&Value> {
        self.properties.fetch(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.properties.set(key, value);
    }

    /// Apply properties, routing `roles`, `user` and `port` to the server
    /// itself and merging everything else.
    pub fn with(&mut self, properties: Properties) -> Result<&mut Self> {
        self.apply(properties, false)?;
        Ok(self)
    }

    /// [`Server::with`], refusing a `port` other than the current one when
    /// `port_locked`. Nothing is applied when the port is refused.
    pub(crate) fn apply(&mut self, properties: Properties, port_locked: bool) -> Result<()> {
        if port_locked {
            if let Some(value) = properties.fetch(PORT_KEY) {
                if port_from_value(value)? != self.port {
                    return Err(Error::RegisteredPort {
                        hostname: self.hostname.clone(),
                    });
                }
            }
        }
        for (key, value) in properties {
            match key.as_str() {
                ROLES_KEY => {
                    let roles: Vec<String> =
                        value.to_list().iter().map(Value::to_plain_string).collect();
                    self.add_roles(roles);
                }
                USER_KEY => match value {
                    Value::Null => self.user = None,
                    other => self.user = Some(other.to_plain_string()),
                },
                PORT_KEY => self.port = port_from_value(&value)?,
                _ => self.properties.set(&key, value),
            }
        }
        Ok(())
    }

    /// Properties with every role-named key removed.
    pub fn non_role_properties(&self) -> Properties {
        let keys: Vec<&String> = self
            .properties
            .keys()
            .filter(|k| !self.roles.contains(*k))
            .collect();
        self.properties.slice(&keys)
    }

    /// Non-role properties overlaid with the sub-properties of each requested
    /// role the server actually has, in request order.
    pub fn role_properties_for<S: AsRef<str>>(&self, roles: &[S]) -> Properties {
        let mut props = self.non_role_properties();
        let mut seen: Vec<String> = Vec::new();
        for role in roles {
            let role = normalize_key(role.as_ref());
            if seen.contains(&role) || !self.has_role(&role) {
                continue;
            }
            match self.properties.fetch(&role) {
                Some(Value::Map(overrides)) => {
                    for (key, value) in overrides {
                        props.set(key, value.clone());
                    }
                }
                Some(other) => {
                    tracing::debug!(
                        host = %self.hostname,
                        role = %role,
                        value = %other,
                        "Role properties are not a map; skipping"
                    );
                }
                None => {}
            }
            seen.push(role);
        }
        props
    }

    /// Whether every criterion holds.
    pub fn select(&self, criteria: &Criteria) -> bool {
        criteria.iter().all(|criterion| criterion.holds(self))
    }

    /// Whether the server is flagged as its role's primary.
    pub fn primary(&self) -> bool {
        self.fetch("primary").is_some_and(Value::is_truthy)
    }

    /// Same hostname and port. Kept in line with the registry's dedup key.
    pub fn matches(&self, other: &Server) -> bool {
        self.hostname == other.hostname && self.port == other.port
    }
}

impl PartialEq for Server {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

impl Eq for Server {}

impl Hash for Server {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hostname.hash(state);
        self.port.hash(state);
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hostname)
    }
}

pub(crate) fn port_from_value(value: &Value) -> Result<Option<u16>> {
    let invalid = || Error::InvalidPort {
        value: value.to_plain_string(),
    };
    match value {
        Value::Null => Ok(None),
        Value::Integer(port) => u16::try_from(*port).map(Some).map_err(|_| invalid()),
        Value::String(port) => port.trim().parse::<u16>().map(Some).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("web1", "web1", None, None)]
    #[case("web1:2222", "web1", Some(2222), None)]
    #[case("deploy@web1", "web1", None, Some("deploy"))]
    #[case("deploy@web1:2222", "web1", Some(2222), Some("deploy"))]
    #[case("[::1]:22", "::1", Some(22), None)]
    #[case("fe80::1", "fe80::1", None, None)]
    fn parses_host_specs(
        #[case] spec: &str,
        #[case] hostname: &str,
        #[case] port: Option<u16>,
        #[case] user: Option<&str>,
    ) {
        let server = Server::parse(spec).unwrap();
        assert_eq!(server.hostname(), hostname);
        assert_eq!(server.port(), port);
        assert_eq!(server.user(), user);
    }

    #[rstest]
    #[case("web1:notaport")]
    #[case("@web1")]
    #[case("web1:")]
    #[case("[::1")]
    fn rejects_malformed_specs(#[case] spec: &str) {
        assert!(matches!(
            Server::parse(spec),
            Err(Error::InvalidHostSpec { .. })
        ));
    }

    #[test]
    fn roles_are_not_duplicated() {
        let mut server = Server::new("web1");
        server.add_role("app").add_role(":app").add_role("db");
        assert_eq!(server.roles(), &["app".to_string(), "db".to_string()]);
        assert!(server.has_role(":db"));
    }

    #[test]
    fn with_routes_reserved_keys() {
        let mut server = Server::new("web1");
        server
            .with(Properties::from_json(json!({
                "roles": ["app", "web"],
                "user": "deploy",
                "port": 2222,
                "primary": true
            })))
            .unwrap();

        assert_eq!(server.roles(), &["app".to_string(), "web".to_string()]);
        assert_eq!(server.user(), Some("deploy"));
        assert_eq!(server.port(), Some(2222));
        assert!(server.primary());
        assert!(server.fetch("roles").is_none());
    }

    #[test]
    fn with_rejects_out_of_range_port() {
        let mut server = Server::new("web1");
        let err = server
            .with(Properties::from_json(json!({"port": 70000})))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPort { .. }));
    }

    #[test]
    fn equality_ignores_user() {
        let a = Server::parse("alice@web1:22").unwrap();
        let b = Server::parse("bob@web1:22").unwrap();
        let c = Server::parse("web1:23").unwrap();
        assert_eq!(a, b);
        assert!(a.matches(&b));
        assert_ne!(a, c);
    }

    #[test]
    fn display_is_the_hostname() {
        let server = Server::parse("deploy@web1:2222").unwrap();
        assert_eq!(server.to_string(), "web1");
    }
}
