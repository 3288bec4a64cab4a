//! Server registry and filtering for Rig
//!
//! This crate tracks the hosts a deployment targets and narrows them down:
//!
//! - **Registry**: [`Servers`] de-duplicates hosts by hostname and port and
//!   keeps them in registration order
//! - **Properties**: per-server [`Properties`] merge on write, with role-named
//!   keys holding role-scoped overrides
//! - **Filtering**: [`Filter`] picks a host or role matching strategy from the
//!   filter values, with `all` disabling filtering altogether
//!
//! # Example
//!
//! ```
//! use rig_servers::{Criteria, Properties, Servers};
//!
//! let mut servers = Servers::new();
//! servers.add_role("app", ["web1", "web2"], &Properties::new()).unwrap();
//! servers.add_role("db", ["db1"], &Properties::new()).unwrap();
//!
//! let app = servers.roles_for(["app"], &Criteria::new()).unwrap();
//! assert_eq!(app.len(), 2);
//! ```

pub mod criteria;
pub mod error;
pub mod filter;
pub mod properties;
pub mod server;
pub mod servers;

pub use criteria::{Criteria, Criterion, Predicate};
pub use error::{Error, Result};
pub use filter::{
    ALL, Candidate, EmptyFilter, Filter, FilterKind, FilterStrategy, FilterValue, HostFilter,
    NullFilter, RoleFilter,
};
pub use properties::Properties;
pub use server::{Server, ServerKey};
pub use servers::{PropertyRecord, RegisteredServer, Servers};
