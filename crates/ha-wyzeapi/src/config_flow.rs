//! Config flow for adding a Wyze account

use async_trait::async_trait;
use ha_config_entries::{
    ConfigData, ConfigEntryUpdate, ConfigFlow, FlowStep, FormField, HomeAssistant,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::client::{WyzeClientFactory, WyzeError};
use crate::config::WyzeConfig;
use crate::constants::{CONF_PASSWORD, CONF_USERNAME, DOMAIN};
use crate::error::IntegrationError;

/// Handles the `user` and `import` steps for the `wyzeapi` domain
pub struct WyzeConfigFlow {
    factory: Arc<dyn WyzeClientFactory>,
}

impl WyzeConfigFlow {
    pub fn new(factory: Arc<dyn WyzeClientFactory>) -> Self {
        Self { factory }
    }

    fn user_form(errors: HashMap<String, String>) -> FlowStep {
        FlowStep::Form {
            step_id: "user".to_string(),
            data_schema: vec![
                FormField::required_string(CONF_USERNAME),
                FormField::required_string(CONF_PASSWORD),
            ],
            errors,
        }
    }

    /// Log in once to check the credentials, then let the session go
    async fn validate(&self, config: &WyzeConfig) -> Result<(), WyzeError> {
        let client = self.factory.create().await?;
        client.login(&config.username, &config.password).await?;
        client.close().await
    }

    async fn step_user(
        &self,
        hass: &HomeAssistant,
        input: Option<ConfigData>,
    ) -> anyhow::Result<FlowStep> {
        let Some(input) = input else {
            return Ok(Self::user_form(HashMap::new()));
        };
        let config = WyzeConfig::from_data(&input)?;

        let unique_id = config.unique_id();
        if hass
            .config_entries
            .get_by_unique_id(DOMAIN, &unique_id)
            .is_some()
        {
            return Ok(FlowStep::abort("already_configured"));
        }

        let error = match self.validate(&config).await {
            Ok(()) => {
                return Ok(FlowStep::CreateEntry {
                    title: config.username.clone(),
                    data: config.to_data(),
                    unique_id: Some(unique_id),
                })
            }
            Err(WyzeError::Auth(_)) => "invalid_auth",
            Err(err) => {
                warn!("Could not validate Wyze account: {}", err);
                "cannot_connect"
            }
        };

        Ok(Self::user_form(HashMap::from([(
            "base".to_string(),
            error.to_string(),
        )])))
    }

    async fn step_import(
        &self,
        hass: &HomeAssistant,
        input: Option<ConfigData>,
    ) -> anyhow::Result<FlowStep> {
        let input = input.ok_or(IntegrationError::MissingCredential(CONF_USERNAME))?;
        let config = WyzeConfig::from_data(&input)?;
        let unique_id = config.unique_id();

        if let Some(existing) = hass.config_entries.get_by_unique_id(DOMAIN, &unique_id) {
            debug!("Account already configured, updating credentials of {}", existing.entry_id);
            hass.config_entries
                .update(
                    &existing.entry_id,
                    ConfigEntryUpdate::new().data(config.to_data()),
                )
                .await?;
            return Ok(FlowStep::abort("already_configured"));
        }

        // Setup logs in, so the import does not need its own round trip
        Ok(FlowStep::CreateEntry {
            title: config.username.clone(),
            data: config.to_data(),
            unique_id: Some(unique_id),
        })
    }
}

#[async_trait]
impl ConfigFlow for WyzeConfigFlow {
    async fn step(
        &self,
        hass: &HomeAssistant,
        step_id: &str,
        input: Option<ConfigData>,
    ) -> anyhow::Result<FlowStep> {
        match step_id {
            "user" => self.step_user(hass, input).await,
            "import" => self.step_import(hass, input).await,
            other => Err(IntegrationError::UnsupportedStep(other.to_string()).into()),
        }
    }
}
