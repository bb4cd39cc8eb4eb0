//! Config Entries
//!
//! This crate provides the host side of Home Assistant's integration model.
//! Config entries represent individual integration instances; this crate
//! manages their lifecycle (setup, unload, removal), drives the config flows
//! that create them, and forwards each entry to the entity platforms an
//! integration provides.
//!
//! # Key Types
//!
//! - [`HomeAssistant`] - Explicit host context passed to integrations
//! - [`ConfigEntry`] - A single integration configuration
//! - [`ConfigEntries`] - Manager for all config entries
//! - [`FlowManager`] - Runs [`ConfigFlow`] handlers
//! - [`HassData`] - Per-domain shared state
//! - [`Integration`] / [`EntityPlatform`] - Traits integrations implement
//!
//! # Storage
//!
//! Config entries are persisted in `.storage/core.config_entries` with
//! version tracking.

pub mod data;
pub mod entry;
pub mod error;
pub mod flow;
pub mod hass;
pub mod integration;
pub mod manager;
pub mod platform;
pub mod state_machine;
pub mod storage;

pub use data::HassData;
pub use entry::{
    ConfigData, ConfigEntry, ConfigEntryDisabledBy, ConfigEntrySource, ConfigEntryState,
    ConfigEntryUpdate,
};
pub use error::{ConfigEntriesError, ConfigEntriesResult};
pub use flow::{
    ConfigFlow, FlowContext, FlowManager, FlowProgress, FlowResult, FlowResultType, FlowStep,
    FormField,
};
pub use hass::HomeAssistant;
pub use integration::Integration;
pub use manager::{
    ConfigEntries, ConfigEntriesData, STORAGE_KEY, STORAGE_MINOR_VERSION, STORAGE_VERSION,
};
pub use platform::{EntityPlatform, Platform, UnknownPlatform};
pub use state_machine::InvalidTransition;
pub use storage::{Storable, Storage, StorageError, StorageFile, StorageResult};
