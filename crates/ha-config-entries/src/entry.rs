//! Config Entry types
//!
//! A ConfigEntry represents a single instance of an integration's configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::state_machine::InvalidTransition;

/// Entry `data` / `options` payload
pub type ConfigData = HashMap<String, serde_json::Value>;

/// Config entry lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntryState {
    /// Initial state, not yet set up
    #[default]
    NotLoaded,
    /// Currently being configured (non-recoverable)
    SetupInProgress,
    /// Successfully set up (recoverable)
    Loaded,
    /// Setup failed (recoverable)
    SetupError,
    /// Version migration failed (not recoverable)
    MigrationError,
    /// Currently unloading (non-recoverable)
    UnloadInProgress,
    /// Unload failed (not recoverable)
    FailedUnload,
}

impl ConfigEntryState {
    /// Check if the entry can be unloaded/reloaded from this state
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ConfigEntryState::Loaded | ConfigEntryState::SetupError | ConfigEntryState::NotLoaded
        )
    }
}

/// Source of the config entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntrySource {
    /// Configured via UI/API
    #[default]
    User,
    /// Imported from YAML config
    Import,
    /// Generic discovery
    Discovery,
    /// Re-authentication flow
    Reauth,
    /// User reconfiguring existing entry
    Reconfigure,
    /// User hiding a discovery
    Ignore,
    /// System-created entry
    System,
}

impl ConfigEntrySource {
    /// Flow step that a flow started from this source begins with
    pub fn step_id(&self) -> &'static str {
        match self {
            ConfigEntrySource::User => "user",
            ConfigEntrySource::Import => "import",
            ConfigEntrySource::Discovery => "discovery",
            ConfigEntrySource::Reauth => "reauth",
            ConfigEntrySource::Reconfigure => "reconfigure",
            ConfigEntrySource::Ignore => "ignore",
            ConfigEntrySource::System => "system",
        }
    }
}

/// Reason an entry was disabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntryDisabledBy {
    /// Disabled by the user
    User,
}

/// A configuration entry for an integration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Unique identifier (ULID)
    pub entry_id: String,

    /// Integration domain (e.g., "wyzeapi")
    pub domain: String,

    /// Human-readable display name
    pub title: String,

    /// Immutable configuration data
    #[serde(default)]
    pub data: ConfigData,

    /// User-configurable options
    #[serde(default)]
    pub options: ConfigData,

    /// Major schema version
    #[serde(default = "default_version")]
    pub version: u32,

    /// Minor schema version
    #[serde(default = "default_version")]
    pub minor_version: u32,

    /// Optional unique identifier for duplicate prevention
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,

    /// Origin type
    #[serde(default)]
    pub source: ConfigEntrySource,

    /// Current lifecycle state (not persisted)
    #[serde(skip, default)]
    pub state: ConfigEntryState,

    /// Human-readable explanation for failed states
    #[serde(skip, default)]
    pub reason: Option<String>,

    /// Prevent auto-entity creation
    #[serde(default)]
    pub pref_disable_new_entities: bool,

    /// Disable background polling
    #[serde(default)]
    pub pref_disable_polling: bool,

    /// What disabled this entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_by: Option<ConfigEntryDisabledBy>,

    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl ConfigEntry {
    /// Create a new config entry
    pub fn new(domain: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            entry_id: ulid::Ulid::new().to_string(),
            domain: domain.into(),
            title: title.into(),
            data: ConfigData::new(),
            options: ConfigData::new(),
            version: 1,
            minor_version: 1,
            unique_id: None,
            source: ConfigEntrySource::User,
            state: ConfigEntryState::NotLoaded,
            reason: None,
            pref_disable_new_entities: false,
            pref_disable_polling: false,
            disabled_by: None,
            created_at: now,
            modified_at: now,
        }
    }

    /// Set entry data
    pub fn with_data(mut self, data: ConfigData) -> Self {
        self.data = data;
        self
    }

    /// Set entry options
    pub fn with_options(mut self, options: ConfigData) -> Self {
        self.options = options;
        self
    }

    /// Set unique_id
    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    /// Set source
    pub fn with_source(mut self, source: ConfigEntrySource) -> Self {
        self.source = source;
        self
    }

    /// Set version
    pub fn with_version(mut self, version: u32, minor_version: u32) -> Self {
        self.version = version;
        self.minor_version = minor_version;
        self
    }

    /// String value stored under `key` in `data`, if it is a string
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(serde_json::Value::as_str)
    }

    /// Check if entry is disabled
    pub fn is_disabled(&self) -> bool {
        self.disabled_by.is_some()
    }

    /// Check if entry is loaded
    pub fn is_loaded(&self) -> bool {
        self.state == ConfigEntryState::Loaded
    }

    /// Attempt to transition to a new state with validation.
    ///
    /// On success, updates the state and reason fields. An invalid transition
    /// leaves the entry untouched.
    pub fn try_set_state(
        &mut self,
        new_state: ConfigEntryState,
        reason: Option<String>,
    ) -> Result<(), InvalidTransition> {
        self.state.try_transition(new_state)?;
        self.state = new_state;
        self.reason = reason;
        Ok(())
    }
}

/// Update data for a config entry
#[derive(Debug, Default)]
pub struct ConfigEntryUpdate {
    pub title: Option<String>,
    pub data: Option<ConfigData>,
    pub options: Option<ConfigData>,
    pub unique_id: Option<Option<String>>,
    pub pref_disable_new_entities: Option<bool>,
    pub pref_disable_polling: Option<bool>,
}

impl ConfigEntryUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn data(mut self, data: ConfigData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn options(mut self, options: ConfigData) -> Self {
        self.options = Some(options);
        self
    }

    pub fn unique_id(mut self, unique_id: Option<String>) -> Self {
        self.unique_id = Some(unique_id);
        self
    }
}
