//! Errors raised by the integration itself
//!
//! Failures of the Wyze client are not wrapped; they reach the host as the
//! [`WyzeError`](crate::WyzeError) the client returned.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntegrationError {
    /// The `wyzeapi:` section of configuration.yaml is malformed
    #[error("invalid wyzeapi configuration: {0}")]
    InvalidConfig(#[from] serde_yaml::Error),

    /// Entry data or flow input lacks a credential
    #[error("missing {0}")]
    MissingCredential(&'static str),

    /// Unload was requested for an entry with no stored client
    #[error("entry {0} is not loaded")]
    NotLoaded(String),

    #[error("unsupported config flow step: {0}")]
    UnsupportedStep(String),
}
