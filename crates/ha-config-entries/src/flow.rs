//! Config flows
//!
//! A flow is a short dialogue between the host and an integration's
//! [`ConfigFlow`] handler that ends with a new config entry or an abort.
//! Flows start from a source (`user`, `import`, ...) that picks the first
//! step; forms keep the flow in progress until the caller submits input
//! through [`FlowManager::configure`].

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::entry::{ConfigData, ConfigEntry, ConfigEntrySource};
use crate::error::{ConfigEntriesError, ConfigEntriesResult};
use crate::hass::HomeAssistant;

/// Context a flow was started with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowContext {
    pub source: ConfigEntrySource,
}

impl FlowContext {
    pub fn new(source: ConfigEntrySource) -> Self {
        Self { source }
    }
}

/// Form field schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl FormField {
    /// A required string field
    pub fn required_string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: "string".to_string(),
            required: Some(true),
            default: None,
        }
    }
}

/// What a handler step decided
#[derive(Debug, Clone, PartialEq)]
pub enum FlowStep {
    /// Ask the user for (more) input
    Form {
        step_id: String,
        data_schema: Vec<FormField>,
        errors: HashMap<String, String>,
    },
    /// Finish by creating a config entry
    CreateEntry {
        title: String,
        data: ConfigData,
        unique_id: Option<String>,
    },
    /// Finish without creating anything
    Abort { reason: String },
}

impl FlowStep {
    pub fn abort(reason: impl Into<String>) -> Self {
        FlowStep::Abort {
            reason: reason.into(),
        }
    }
}

/// A domain's config flow handler
#[async_trait]
pub trait ConfigFlow: Send + Sync {
    /// Schema version of the entries this flow creates
    fn version(&self) -> u32 {
        1
    }

    /// Run `step_id` with the submitted input (`None` when first shown)
    async fn step(
        &self,
        hass: &HomeAssistant,
        step_id: &str,
        input: Option<ConfigData>,
    ) -> anyhow::Result<FlowStep>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowResultType {
    Form,
    CreateEntry,
    Abort,
}

/// Result of a flow step as reported to callers
#[derive(Debug, Clone, Serialize)]
pub struct FlowResult {
    pub flow_id: String,
    /// Integration domain
    pub handler: String,
    #[serde(rename = "type")]
    pub result_type: FlowResultType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    /// Always present, empty if no schema
    pub data_schema: Vec<FormField>,
    pub errors: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// The created entry (create_entry only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ConfigEntry>,
}

impl FlowResult {
    fn new(flow_id: &str, handler: &str, result_type: FlowResultType) -> Self {
        Self {
            flow_id: flow_id.to_string(),
            handler: handler.to_string(),
            result_type,
            step_id: None,
            data_schema: Vec::new(),
            errors: None,
            title: None,
            reason: None,
            version: None,
            result: None,
        }
    }
}

/// A flow waiting for input
#[derive(Debug, Clone)]
pub struct FlowProgress {
    pub flow_id: String,
    pub handler: String,
    pub step_id: String,
    pub context: FlowContext,
}

/// Runs config flows for registered handlers
#[derive(Default)]
pub struct FlowManager {
    handlers: DashMap<String, Arc<dyn ConfigFlow>>,
    progress: DashMap<String, FlowProgress>,
}

impl FlowManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the config flow for a domain
    pub fn register(&self, domain: &str, handler: Arc<dyn ConfigFlow>) {
        self.handlers.insert(domain.to_string(), handler);
        debug!("Registered config flow for domain: {}", domain);
    }

    fn handler(&self, domain: &str) -> ConfigEntriesResult<Arc<dyn ConfigFlow>> {
        self.handlers
            .get(domain)
            .map(|h| h.value().clone())
            .ok_or_else(|| ConfigEntriesError::UnknownHandler(domain.to_string()))
    }

    /// Start a flow for `domain`; the context's source picks the first step
    pub async fn init(
        &self,
        hass: &HomeAssistant,
        domain: &str,
        context: FlowContext,
        data: Option<ConfigData>,
    ) -> ConfigEntriesResult<FlowResult> {
        let handler = self.handler(domain)?;
        let progress = FlowProgress {
            flow_id: Ulid::new().to_string(),
            handler: domain.to_string(),
            step_id: context.source.step_id().to_string(),
            context,
        };
        debug!(
            "Starting {} flow {} for {}",
            progress.step_id, progress.flow_id, domain
        );
        self.run_step(hass, handler, progress, data).await
    }

    /// Submit input to a flow that is showing a form
    pub async fn configure(
        &self,
        hass: &HomeAssistant,
        flow_id: &str,
        input: Option<ConfigData>,
    ) -> ConfigEntriesResult<FlowResult> {
        let progress = self
            .progress
            .get(flow_id)
            .map(|p| p.value().clone())
            .ok_or_else(|| ConfigEntriesError::UnknownFlow(flow_id.to_string()))?;
        let handler = self.handler(&progress.handler)?;
        self.run_step(hass, handler, progress, input).await
    }

    /// Flows currently waiting for input
    pub fn in_progress(&self) -> Vec<FlowProgress> {
        self.progress.iter().map(|p| p.value().clone()).collect()
    }

    /// Drop a flow without finishing it
    pub fn abort(&self, flow_id: &str) -> bool {
        self.progress.remove(flow_id).is_some()
    }

    async fn run_step(
        &self,
        hass: &HomeAssistant,
        handler: Arc<dyn ConfigFlow>,
        progress: FlowProgress,
        input: Option<ConfigData>,
    ) -> ConfigEntriesResult<FlowResult> {
        let step = handler
            .step(hass, &progress.step_id, input)
            .await
            .map_err(|source| ConfigEntriesError::FlowFailed {
                handler: progress.handler.clone(),
                source,
            });
        let step = match step {
            Ok(step) => step,
            Err(err) => {
                self.progress.remove(&progress.flow_id);
                return Err(err);
            }
        };

        let flow_id = progress.flow_id.clone();
        let domain = progress.handler.clone();

        match step {
            FlowStep::Form {
                step_id,
                data_schema,
                errors,
            } => {
                let mut result = FlowResult::new(&flow_id, &domain, FlowResultType::Form);
                result.step_id = Some(step_id.clone());
                result.data_schema = data_schema;
                result.errors = Some(errors);
                self.progress
                    .insert(flow_id, FlowProgress { step_id, ..progress });
                Ok(result)
            }
            FlowStep::Abort { reason } => {
                self.progress.remove(&flow_id);
                debug!("Flow {} for {} aborted: {}", flow_id, domain, reason);
                let mut result = FlowResult::new(&flow_id, &domain, FlowResultType::Abort);
                result.reason = Some(reason);
                Ok(result)
            }
            FlowStep::CreateEntry {
                title,
                data,
                unique_id,
            } => {
                self.progress.remove(&flow_id);

                let mut entry = ConfigEntry::new(&domain, &title)
                    .with_data(data)
                    .with_source(progress.context.source)
                    .with_version(handler.version(), 1);
                if let Some(unique_id) = unique_id {
                    entry = entry.with_unique_id(unique_id);
                }
                let entry = hass.config_entries.add(entry).await?;
                info!(
                    "Flow {} created entry {} for {}",
                    flow_id, entry.entry_id, domain
                );

                if hass.config_entries.integration(&domain).is_some() {
                    // Setup failures are recorded on the entry itself
                    if let Err(err) = hass.config_entries.setup(hass, &entry.entry_id).await {
                        warn!("Setup of new entry {} failed: {}", entry.entry_id, err);
                    }
                }

                let entry = hass.config_entries.get(&entry.entry_id).unwrap_or(entry);
                let mut result = FlowResult::new(&flow_id, &domain, FlowResultType::CreateEntry);
                result.title = Some(title);
                result.version = Some(entry.version);
                result.result = Some(entry);
                Ok(result)
            }
        }
    }
}
