//! Error types for rig-vars

/// Result type for rig-vars operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the variable store
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Conflicting arguments were supplied to a store operation
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A required key was never set
    #[error("Key not found: {key}")]
    KeyNotFound { key: String },

    /// A registered validator rejected a resolved value
    #[error("Validation failed for {key}: {message}")]
    Validation { key: String, message: String },
}

impl Error {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
