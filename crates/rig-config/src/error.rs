//! Error types for rig-config

/// Result type for rig-config operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or querying a configuration
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A role was declared with a reserved name
    #[error("{role} reserved name for role. Please choose another name")]
    DuplicateRoleName { role: String },

    /// Properties were requested for a role the server does not have
    #[error("Role {role} doesn't exist for {host}")]
    RoleNotFoundOnServer { role: String, host: String },

    // Transparent wrappers for underlying crate errors
    /// Variable store error from rig-vars
    #[error(transparent)]
    Vars(#[from] rig_vars::Error),

    /// Registry or filter error from rig-servers
    #[error(transparent)]
    Servers(#[from] rig_servers::Error),

    /// TOML deserialization error
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}
