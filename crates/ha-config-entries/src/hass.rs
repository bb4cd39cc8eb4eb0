//! The host context handed to integrations

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use ha_config::HomeAssistantConfig;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::data::HassData;
use crate::entry::ConfigEntryState;
use crate::error::{ConfigEntriesError, ConfigEntriesResult};
use crate::flow::FlowManager;
use crate::integration::Integration;
use crate::manager::ConfigEntries;
use crate::platform::{EntityPlatform, Platform};
use crate::storage::Storage;

/// One Home Assistant installation.
///
/// Cheap to clone; clones share the same entries, flows, data and tasks.
#[derive(Clone)]
pub struct HomeAssistant {
    config_dir: Arc<PathBuf>,
    /// Config entry manager
    pub config_entries: Arc<ConfigEntries>,
    /// Config flow manager
    pub flow: Arc<FlowManager>,
    /// Per-domain shared state
    pub data: Arc<HassData>,
    tasks: Arc<TaskTracker>,
}

impl HomeAssistant {
    /// Create an installation rooted at `config_dir` with no entries loaded
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        let config_dir = config_dir.into();
        let storage = Arc::new(Storage::new(&config_dir));

        Self {
            config_dir: Arc::new(config_dir),
            config_entries: Arc::new(ConfigEntries::new(storage)),
            flow: Arc::new(FlowManager::new()),
            data: Arc::new(HassData::new()),
            tasks: Arc::new(TaskTracker::default()),
        }
    }

    /// Create an installation and load its persisted config entries
    pub async fn load(config_dir: impl Into<PathBuf>) -> ConfigEntriesResult<Self> {
        let hass = Self::new(config_dir);
        hass.config_entries.load().await?;
        Ok(hass)
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Register an integration's lifecycle hooks
    pub fn register_integration(&self, integration: Arc<dyn Integration>) {
        self.config_entries.register_integration(integration);
    }

    /// Register an integration's implementation of an entity platform
    pub fn register_platform(
        &self,
        domain: &str,
        platform: Platform,
        handler: Arc<dyn EntityPlatform>,
    ) {
        self.config_entries.register_platform(domain, platform, handler);
    }

    /// Set up a component: run its YAML setup, then set up its config entries.
    ///
    /// Entry failures are recorded on the entries and do not fail the component.
    pub async fn setup_component(
        &self,
        domain: &str,
        config: &HomeAssistantConfig,
    ) -> ConfigEntriesResult<bool> {
        let integration = self
            .config_entries
            .integration(domain)
            .ok_or_else(|| ConfigEntriesError::IntegrationNotFound(domain.to_string()))?;

        let ok = integration
            .setup(self, config)
            .await
            .map_err(|source| ConfigEntriesError::ComponentSetupFailed {
                domain: domain.to_string(),
                source,
            })?;
        if !ok {
            warn!("Setup of {} returned false", domain);
            return Ok(false);
        }

        for entry in self.config_entries.get_by_domain(domain) {
            if entry.state != ConfigEntryState::NotLoaded || entry.is_disabled() {
                continue;
            }
            if let Err(err) = self.config_entries.setup(self, &entry.entry_id).await {
                warn!("Entry {} of {} failed to set up: {}", entry.entry_id, domain, err);
            }
        }

        info!("Setup of domain {} complete", domain);
        Ok(true)
    }

    /// Schedule work on the runtime. [`block_till_done`](Self::block_till_done) waits for it.
    pub fn create_task<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(future);
    }

    /// Wait until every scheduled task, including ones scheduled meanwhile, finished
    pub async fn block_till_done(&self) {
        self.tasks.join_all().await;
    }
}

/// Handles of tasks scheduled through [`HomeAssistant::create_task`]
#[derive(Default)]
struct TaskTracker {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskTracker {
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }

    async fn join_all(&self) {
        loop {
            let pending =
                std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
            if pending.is_empty() {
                break;
            }
            debug!("Waiting for {} scheduled tasks", pending.len());
            for handle in pending {
                if let Err(err) = handle.await {
                    error!("Scheduled task did not complete: {}", err);
                }
            }
        }
    }
}
