//! Lifecycle of the integration: YAML import, entry setup and unload

use async_trait::async_trait;
use futures::future::join_all;
use ha_config::HomeAssistantConfig;
use ha_config_entries::{
    ConfigEntry, ConfigEntryUpdate, ConfigEntrySource, FlowContext, HomeAssistant, Integration,
};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::client::WyzeClientFactory;
use crate::config::WyzeConfig;
use crate::config_flow::WyzeConfigFlow;
use crate::constants::{DOMAIN, PLATFORMS};
use crate::data::{WyzeData, WyzeEntryData};
use crate::error::IntegrationError;

/// Import the `wyzeapi:` section of configuration.yaml.
///
/// An existing entry with the same username and password is updated in
/// place; otherwise an import flow is scheduled to create one.
pub async fn async_setup(hass: &HomeAssistant, config: &HomeAssistantConfig) -> anyhow::Result<bool> {
    let Some(section) = config.domain(DOMAIN) else {
        debug!("Nothing to import from configuration.yaml, loading from integrations");
        return Ok(true);
    };

    let imported = WyzeConfig::from_yaml(section)?;
    debug!(
        "Importing config information for {} from configuration.yaml",
        imported.username
    );

    let entries = hass.config_entries.get_by_domain(DOMAIN);
    if !entries.is_empty() {
        debug!("Found existing config entries");
    }

    let existing = entries.iter().find(|entry| imported.matches(&entry.data));
    match existing {
        Some(entry) => {
            debug!("Updating existing entry");
            hass.config_entries
                .update(
                    &entry.entry_id,
                    ConfigEntryUpdate::new().data(imported.to_data()),
                )
                .await?;
        }
        None => {
            debug!("Creating new config entry");
            let flow_hass = hass.clone();
            hass.create_task(async move {
                let result = flow_hass
                    .flow
                    .init(
                        &flow_hass,
                        DOMAIN,
                        FlowContext::new(ConfigEntrySource::Import),
                        Some(imported.to_data()),
                    )
                    .await;
                if let Err(err) = result {
                    error!("Import of {} configuration failed: {}", DOMAIN, err);
                }
            });
        }
    }

    Ok(true)
}

/// Log in with the entry's credentials, store the client and forward the
/// entry to every platform in [`PLATFORMS`].
pub async fn async_setup_entry(
    hass: &HomeAssistant,
    entry: &ConfigEntry,
    factory: &dyn WyzeClientFactory,
) -> anyhow::Result<bool> {
    let domain_data = hass.data.get_or_insert_with(DOMAIN, WyzeData::default)?;
    let credentials = WyzeConfig::from_data(&entry.data)?;

    let client = factory.create().await?;
    client
        .login(&credentials.username, &credentials.password)
        .await?;

    if domain_data
        .insert(&entry.entry_id, WyzeEntryData { client })
        .is_some()
    {
        debug!("Replaced client of entry {}", entry.entry_id);
    }

    hass.config_entries.forward_entry_setups(hass, entry, &PLATFORMS);

    info!("Wyze account {} set up", credentials.username);
    Ok(true)
}

/// Close the entry's client and unload every platform concurrently.
///
/// The stored client is dropped only when all platforms unloaded.
pub async fn async_unload_entry(hass: &HomeAssistant, entry: &ConfigEntry) -> anyhow::Result<bool> {
    let domain_data = hass
        .data
        .get::<WyzeData>(DOMAIN)?
        .ok_or_else(|| IntegrationError::NotLoaded(entry.entry_id.clone()))?;
    let client = domain_data
        .client(&entry.entry_id)
        .ok_or_else(|| IntegrationError::NotLoaded(entry.entry_id.clone()))?;

    client.close().await?;

    let results = join_all(
        PLATFORMS
            .into_iter()
            .map(|platform| hass.config_entries.forward_entry_unload(hass, entry, platform)),
    )
    .await;

    let mut unload_ok = true;
    for result in results {
        unload_ok &= result?;
    }

    if unload_ok {
        domain_data.remove(&entry.entry_id);
    } else {
        debug!(
            "Keeping client of entry {}, not every platform unloaded",
            entry.entry_id
        );
    }

    Ok(unload_ok)
}

/// The integration as registered with the host
pub struct WyzeIntegration {
    factory: Arc<dyn WyzeClientFactory>,
}

impl WyzeIntegration {
    pub fn new(factory: Arc<dyn WyzeClientFactory>) -> Self {
        Self { factory }
    }

    /// Register the integration and its config flow with `hass`
    pub fn register(hass: &HomeAssistant, factory: Arc<dyn WyzeClientFactory>) {
        hass.flow
            .register(DOMAIN, Arc::new(WyzeConfigFlow::new(factory.clone())));
        hass.register_integration(Arc::new(Self::new(factory)));
    }
}

#[async_trait]
impl Integration for WyzeIntegration {
    fn domain(&self) -> &str {
        DOMAIN
    }

    async fn setup(&self, hass: &HomeAssistant, config: &HomeAssistantConfig) -> anyhow::Result<bool> {
        async_setup(hass, config).await
    }

    async fn setup_entry(&self, hass: &HomeAssistant, entry: &ConfigEntry) -> anyhow::Result<bool> {
        async_setup_entry(hass, entry, self.factory.as_ref()).await
    }

    async fn unload_entry(&self, hass: &HomeAssistant, entry: &ConfigEntry) -> anyhow::Result<bool> {
        async_unload_entry(hass, entry).await
    }
}
