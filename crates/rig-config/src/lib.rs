//! Deployment configuration for Rig
//!
//! This crate is the facade the rest of a deployment run talks to. A
//! [`Configuration`] owns:
//!
//! - the variable store from `rig-vars`, with list helpers such as
//!   [`Configuration::append`] and [`Configuration::remove`]
//! - the server registry from `rig-servers`, with role declarations and
//!   property merging into variables
//! - the server filter chain: command-line filters, custom filters, the
//!   `ROLES`/`HOSTS` environment variables and the `filter` variable
//!
//! # Example
//!
//! ```
//! use rig_config::{Configuration, FilterEnv};
//! use rig_servers::Properties;
//!
//! let mut config = Configuration::new().with_filter_env(FilterEnv::new().with_roles("app"));
//! config.role("app", ["web1", "web2"], &Properties::new()).unwrap();
//! config.role("db", ["db1"], &Properties::new()).unwrap();
//!
//! let targets = config.filtered_servers().unwrap();
//! assert_eq!(targets.len(), 2);
//! ```

pub mod configuration;
pub mod error;
pub mod filters;
pub mod logging;

pub use configuration::{Configuration, FILTER_VARIABLE};
pub use error::{Error, Result};
pub use filters::{FilterEnv, FnFilter, HOSTS_ENV, ROLES_ENV, ServerFilter};
