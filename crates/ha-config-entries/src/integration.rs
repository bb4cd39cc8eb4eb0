//! Integration lifecycle hooks

use async_trait::async_trait;
use ha_config::HomeAssistantConfig;

use crate::entry::ConfigEntry;
use crate::hass::HomeAssistant;

/// Hooks an integration exposes to the host.
///
/// Errors are returned as [`anyhow::Error`] so whatever the integration's
/// collaborators raised reaches the host unchanged; the host records it on
/// the entry and hands it back to the caller.
#[async_trait]
pub trait Integration: Send + Sync {
    /// Integration domain, e.g. `"wyzeapi"`
    fn domain(&self) -> &str;

    /// Component-level setup with the legacy YAML configuration
    async fn setup(&self, _hass: &HomeAssistant, _config: &HomeAssistantConfig) -> anyhow::Result<bool> {
        Ok(true)
    }

    /// Set up one config entry. `Ok(false)` marks the entry as failed.
    async fn setup_entry(&self, hass: &HomeAssistant, entry: &ConfigEntry) -> anyhow::Result<bool>;

    /// Unload one config entry. `Ok(false)` leaves the entry in `FailedUnload`.
    async fn unload_entry(&self, hass: &HomeAssistant, entry: &ConfigEntry) -> anyhow::Result<bool>;
}
