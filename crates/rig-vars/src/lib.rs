//! Variable store for Rig
//!
//! This crate provides the storage layer behind every configuration read and
//! write of a deployment run:
//!
//! - **Values**: a closed, ordered value model shared with the server registry
//! - **Lazy resolution**: deferred values evaluated at read time, unwound
//!   through arbitrarily nested deferrals
//! - **Validation**: per-key validators run on every read
//! - **Diagnostics**: unused keys, untrusted keys, and assignment call sites
//!
//! # Example
//!
//! ```
//! use rig_vars::{Slot, Value, Variables};
//!
//! let mut vars = Variables::new();
//! vars.set("application", "shop").unwrap();
//! vars.set(
//!     "deploy_to",
//!     Slot::deferred(|v| {
//!         let app = v.fetch_value("application")?;
//!         Ok(format!("/var/www/{}", app.to_plain_string()).into())
//!     }),
//! )
//! .unwrap();
//!
//! assert_eq!(vars.fetch_value("deploy_to").unwrap(), Value::from("/var/www/shop"));
//! ```

pub mod error;
pub mod key;
pub mod location;
pub mod slot;
pub mod value;
pub mod variables;

pub use error::{Error, Result};
pub use key::normalize_key;
pub use location::SourceLocation;
pub use slot::{Callable, Deferred, Resolved, Slot};
pub use value::{Value, ValueMap};
pub use variables::{
    Fallback, PRINT_CONFIG_VARIABLES, UntrustedGuard, Variables, VariablesOptions,
};
