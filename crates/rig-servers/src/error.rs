//! Error types for rig-servers

/// Result type for rig-servers operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the server registry and filters
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Filter kind is neither `host` nor `role`
    #[error("Invalid filter type {kind}")]
    InvalidFilterType { kind: String },

    /// A filter value could not be compiled into a regular expression
    #[error("Invalid filter pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A host specification could not be parsed
    #[error("Invalid host specification {spec}: {reason}")]
    InvalidHostSpec { spec: String, reason: String },

    /// A port property is not a valid port number
    #[error("Invalid port {value}")]
    InvalidPort { value: String },

    /// A registered server was asked to move to another port
    #[error("Cannot change the port of registered server {hostname}; register {hostname} with the new port instead")]
    RegisteredPort { hostname: String },
}
