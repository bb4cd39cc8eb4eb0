//! Wyze integration
//!
//! Bridges Wyze cloud accounts into Home Assistant. The integration itself
//! is thin: it turns a username/password into an authenticated
//! [`WyzeClient`], keeps that client in the installation's shared data so
//! the entity platforms can use it, and forwards each config entry to the
//! six platforms in [`PLATFORMS`].
//!
//! Talking to the Wyze cloud is the job of whatever implements
//! [`WyzeClientFactory`]; the entities themselves live in the
//! [`EntityPlatform`](ha_config_entries::EntityPlatform)s registered for the
//! `wyzeapi` domain.
//!
//! # Example
//!
//! ```ignore
//! let hass = HomeAssistant::load("/config").await?;
//! WyzeIntegration::register(&hass, factory);
//! hass.setup_component(DOMAIN, &ha_config::load_configuration("/config")?).await?;
//! ```

mod client;
mod config;
mod config_flow;
mod constants;
mod data;
mod error;
mod setup;

pub use client::{WyzeClient, WyzeClientFactory, WyzeError};
pub use config::WyzeConfig;
pub use config_flow::WyzeConfigFlow;
pub use constants::{CONF_PASSWORD, CONF_USERNAME, DOMAIN, PLATFORMS};
pub use data::{client_for_entry, WyzeData, WyzeEntryData};
pub use error::IntegrationError;
pub use setup::{async_setup, async_setup_entry, async_unload_entry, WyzeIntegration};
