//! The configuration of one deployment run
//!
//! [`Configuration`] pairs the variable store with the server registry and
//! owns the server filter chain. One is built per run and passed to whatever
//! needs it; there is no process-wide instance.

use crate::filters::{FilterEnv, FnFilter, ServerFilter, variable_filters};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rig_servers::{
    ALL, Criteria, Filter, FilterValue, Properties, PropertyRecord, RegisteredServer, Server,
    ServerKey, Servers,
};
use rig_vars::{Resolved, Slot, Value, ValueMap, Variables, VariablesOptions, normalize_key};
use std::cell::OnceCell;
use std::fmt;

/// Variable holding declarative server filters.
pub const FILTER_VARIABLE: &str = "filter";

/// Variables, servers and filters for a deployment run.
#[derive(Default)]
pub struct Configuration {
    variables: Variables,
    servers: Servers,
    cmdline_filters: Vec<Filter>,
    custom_filters: Vec<Box<dyn ServerFilter>>,
    filter_env: Option<FilterEnv>,
    derived_filters: OnceCell<Vec<Filter>>,
    timestamp: OnceCell<DateTime<Utc>>,
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("variables", &self.variables)
            .field("servers", &self.servers)
            .field("cmdline_filters", &self.cmdline_filters)
            .field("custom_filters", &self.custom_filters.len())
            .field("filter_env", &self.filter_env)
            .finish_non_exhaustive()
    }
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a store built with `options`.
    pub fn with_options(options: VariablesOptions) -> Self {
        Self {
            variables: Variables::with_options(options),
            ..Self::default()
        }
    }

    /// Start with initial variables.
    #[track_caller]
    pub fn with_values<I, K, V>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Slot>,
    {
        Ok(Self {
            variables: Variables::from_values(values)?,
            ..Self::default()
        })
    }

    /// Start with initial variables given as TOML text.
    ///
    /// Floats and datetimes are kept in their textual form.
    #[track_caller]
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(text)?;
        Self::with_values(table.into_iter().map(|(key, value)| (key, from_toml(value))))
    }

    /// Use explicit environment filters instead of reading `ROLES`/`HOSTS`.
    pub fn with_filter_env(mut self, env: FilterEnv) -> Self {
        self.filter_env = Some(env);
        self.derived_filters = OnceCell::new();
        self
    }

    /// Discard everything and start over. Meant for test harnesses.
    pub fn reset(&mut self) {
        tracing::debug!("Resetting configuration");
        *self = Self::default();
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut Variables {
        &mut self.variables
    }

    pub fn servers(&self) -> &Servers {
        &self.servers
    }

    pub fn servers_mut(&mut self) -> &mut Servers {
        &mut self.servers
    }

    // Variables

    #[track_caller]
    pub fn set(&mut self, key: &str, value: impl Into<Slot>) -> Result<()> {
        Ok(self.variables.set(key, value)?)
    }

    /// Assign a value computed on every read.
    #[track_caller]
    pub fn set_deferred<F>(&mut self, key: &str, func: F) -> Result<()>
    where
        F: Fn(&Variables) -> rig_vars::Result<Slot> + Send + Sync + 'static,
    {
        Ok(self.variables.set(key, Slot::deferred(func))?)
    }

    /// Assign only if the key has never been set or has been deleted.
    #[track_caller]
    pub fn set_if_empty(&mut self, key: &str, value: impl Into<Slot>) -> Result<()> {
        if self.variables.has_key(key) {
            return Ok(());
        }
        self.set(key, value)
    }

    pub fn fetch(&self, key: &str) -> Result<Resolved> {
        Ok(self.variables.fetch(key)?)
    }

    pub fn fetch_or(&self, key: &str, default: impl Into<Slot>) -> Result<Resolved> {
        Ok(self.variables.fetch_or(key, default)?)
    }

    pub fn fetch_required(&self, key: &str) -> Result<Resolved> {
        Ok(self.variables.fetch_required(key)?)
    }

    pub fn fetch_value(&self, key: &str) -> Result<Value> {
        Ok(self.variables.fetch_value(key)?)
    }

    pub fn delete(&mut self, key: &str) -> Option<Slot> {
        self.variables.delete(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.variables.keys()
    }

    pub fn validate<F>(&mut self, key: &str, validator: F)
    where
        F: Fn(&str, &Value) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.variables.validate(key, validator);
    }

    #[track_caller]
    pub fn merge<I, K, V>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Slot>,
    {
        Ok(self.variables.merge(values)?)
    }

    /// Append to a variable, treating it as a list. Returns the new list.
    #[track_caller]
    pub fn append<I, T>(&mut self, key: &str, values: I) -> Result<Vec<Value>>
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        let mut list = self.fetch_value(key)?.to_list();
        list.extend(values.into_iter().map(Into::into));
        self.set(key, Value::List(list.clone()))?;
        Ok(list)
    }

    /// Remove every occurrence of `values` from a variable, treating it as a
    /// list. Returns the new list.
    #[track_caller]
    pub fn remove<I, T>(&mut self, key: &str, values: I) -> Result<Vec<Value>>
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        let unwanted: Vec<Value> = values.into_iter().map(Into::into).collect();
        let mut list = self.fetch_value(key)?.to_list();
        list.retain(|item| !unwanted.contains(item));
        self.set(key, Value::List(list.clone()))?;
        Ok(list)
    }

    /// Whether a variable holds something: not null, and for collections,
    /// not empty.
    pub fn any(&self, key: &str) -> Result<bool> {
        Ok(match self.fetch(key)? {
            Resolved::Callable(_) => true,
            Resolved::Value(Value::Null) => false,
            Resolved::Value(value @ (Value::List(_) | Value::Set(_) | Value::Map(_))) => {
                !value.is_empty()
            }
            Resolved::Value(_) => true,
        })
    }

    // Servers

    /// Register or update a server.
    pub fn server(&mut self, spec: &str, properties: Properties) -> Result<RegisteredServer<'_>> {
        Ok(self.servers.add_host(spec, properties)?)
    }

    /// Assign a role to hosts. `all` is reserved.
    pub fn role<I, S>(&mut self, name: &str, hosts: I, options: &Properties) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if normalize_key(name) == ALL {
            return Err(Error::DuplicateRoleName {
                role: name.to_string(),
            });
        }
        Ok(self.servers.add_role(name, hosts, options)?)
    }

    pub fn roles_for<I, V>(&self, names: I) -> Result<Vec<&Server>>
    where
        I: IntoIterator<Item = V>,
        V: Into<FilterValue>,
    {
        Ok(self.servers.roles_for(names, &Criteria::new())?)
    }

    pub fn role_properties_for<S: AsRef<str>>(
        &self,
        names: &[S],
        include_non_role_props: bool,
    ) -> Result<Vec<PropertyRecord>> {
        Ok(self
            .servers
            .role_properties_for(names, include_non_role_props)?)
    }

    pub fn all_properties_for<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<PropertyRecord>> {
        Ok(self.servers.all_properties_for(names)?)
    }

    /// Effective properties of each host for the given roles.
    ///
    /// Hosts that were never registered are skipped.
    pub fn properties_for<H, R>(&self, hosts: &[H], roles: &[R]) -> Result<Vec<Properties>>
    where
        H: AsRef<str>,
        R: AsRef<str>,
    {
        let mut found = Vec::new();
        for host in hosts {
            match self.lookup(host.as_ref())? {
                Some(server) => found.push(server.role_properties_for(roles)),
                None => tracing::debug!(host = %host.as_ref(), "Skipping unregistered host"),
            }
        }
        Ok(found)
    }

    /// The primary server of a role.
    pub fn primary(&self, role: &str) -> Result<Option<&Server>> {
        Ok(self.servers.fetch_primary(role)?)
    }

    /// Copy every property of a server into the variables.
    #[track_caller]
    pub fn merge_host(&mut self, spec: &str) -> Result<()> {
        let Some(server) = self.lookup(spec)? else {
            tracing::warn!(host = %spec, "No server to merge properties from");
            return Ok(());
        };
        let properties = server.properties().as_map().clone();
        self.merge(properties)
    }

    /// Copy a server's effective properties for `role` into the variables.
    ///
    /// Role-scoped values override the server's own; the merge into the
    /// variables replaces whole values per key.
    #[track_caller]
    pub fn merge_properties(&mut self, host: &str, role: &str) -> Result<()> {
        let server = self
            .lookup(host)?
            .filter(|server| server.has_role(role))
            .ok_or_else(|| Error::RoleNotFoundOnServer {
                role: normalize_key(role),
                host: normalize_key(host),
            })?;

        let properties: ValueMap = server.role_properties_for(&[role]).into_map();
        if properties.is_empty() {
            tracing::warn!(host = %host, role = %role, "No properties to merge");
            tracing::warn!(host = %host, properties = ?server.properties(), "Server information");
        }
        self.merge(properties)
    }

    fn lookup(&self, spec: &str) -> Result<Option<&Server>> {
        let key: ServerKey = Server::parse(spec)?.key();
        Ok(self.servers.get(&key))
    }

    // Filtering

    /// Add a filter given on the command line.
    pub fn add_cmdline_filter<I, V>(&mut self, kind: &str, values: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<FilterValue>,
    {
        self.cmdline_filters.push(Filter::parse(kind, values)?);
        Ok(())
    }

    /// Add a custom filter, applied after command-line filters.
    pub fn add_filter(&mut self, filter: impl ServerFilter + 'static) {
        self.custom_filters.push(Box::new(filter));
    }

    /// Add a closure as a custom filter.
    pub fn add_filter_fn<F>(&mut self, func: F)
    where
        F: for<'a> Fn(Vec<&'a Server>) -> Vec<&'a Server> + 'static,
    {
        self.add_filter(FnFilter::new(func));
    }

    /// Run servers through every filter, in order: command-line filters,
    /// custom filters, then `ROLES`, `HOSTS` and the `filter` variable.
    ///
    /// Environment and variable filters are worked out on the first call and
    /// reused afterwards.
    pub fn filter<'a, I>(&self, servers: I) -> Result<Vec<&'a Server>>
    where
        I: IntoIterator<Item = &'a Server>,
    {
        let derived = self.derived_filters()?;
        let mut remaining: Vec<&'a Server> = servers.into_iter().collect();

        for stage in &self.cmdline_filters {
            remaining = ServerFilter::filter(stage, remaining);
        }
        for stage in &self.custom_filters {
            remaining = stage.filter(remaining);
        }
        for stage in derived {
            remaining = ServerFilter::filter(stage, remaining);
        }
        Ok(remaining)
    }

    /// Every registered server that passes [`Configuration::filter`].
    pub fn filtered_servers(&self) -> Result<Vec<&Server>> {
        self.filter(&self.servers)
    }

    fn derived_filters(&self) -> Result<&[Filter]> {
        if let Some(filters) = self.derived_filters.get() {
            return Ok(filters.as_slice());
        }

        let env = self.filter_env.clone().unwrap_or_else(FilterEnv::from_env);
        let mut filters = env.filters()?;
        let declared = self.variables.fetch_value(FILTER_VARIABLE)?;
        filters.extend(variable_filters(&declared)?);
        tracing::debug!(count = filters.len(), "Built environment filters");

        Ok(self.derived_filters.get_or_init(|| filters).as_slice())
    }

    // Run metadata

    /// UTC time of the first call, fixed for the rest of the run.
    pub fn timestamp(&self) -> DateTime<Utc> {
        *self.timestamp.get_or_init(Utc::now)
    }
}

fn from_toml(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Integer(i),
        toml::Value::Float(f) => Value::String(f.to_string()),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(d) => Value::String(d.to_string()),
        toml::Value::Array(items) => Value::List(items.into_iter().map(from_toml).collect()),
        toml::Value::Table(table) => Value::Map(
            table
                .into_iter()
                .map(|(key, value)| (key, from_toml(value)))
                .collect(),
        ),
    }
}
