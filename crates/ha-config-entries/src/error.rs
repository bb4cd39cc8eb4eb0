//! Config entries errors

use thiserror::Error;

use crate::entry::ConfigEntryState;
use crate::platform::Platform;
use crate::state_machine::InvalidTransition;
use crate::storage::StorageError;

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;

/// Errors raised by the host while managing entries, flows and platforms.
///
/// Failures coming out of integration code are carried unchanged as the
/// `source` of the matching variant.
#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Entry already exists for domain {domain} with unique_id {unique_id}")]
    AlreadyExists { domain: String, unique_id: String },

    #[error("Cannot unload entry in state {0:?}")]
    CannotUnload(ConfigEntryState),

    #[error(transparent)]
    InvalidState(#[from] InvalidTransition),

    #[error("Integration not found: {0}")]
    IntegrationNotFound(String),

    #[error("Platform {platform} not found for integration {domain}")]
    PlatformNotFound { domain: String, platform: Platform },

    #[error("Setup of {domain} failed: {source}")]
    ComponentSetupFailed {
        domain: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Setup failed for entry {entry_id}: {source}")]
    SetupFailed {
        entry_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Unload failed for entry {entry_id}: {source}")]
    UnloadFailed {
        entry_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Platform {platform} failed for entry {entry_id}: {source}")]
    PlatformFailed {
        platform: Platform,
        entry_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("No config flow registered for {0}")]
    UnknownHandler(String),

    #[error("Unknown flow: {0}")]
    UnknownFlow(String),

    #[error("Config flow for {handler} failed: {source}")]
    FlowFailed {
        handler: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Data stored under {key} has a different type")]
    DataTypeMismatch { key: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
