//! Config Entries Manager
//!
//! Manages the lifecycle of configuration entries and forwards loaded
//! entries to the entity platforms their integration provides.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::entry::{ConfigEntry, ConfigEntryState, ConfigEntryUpdate};
use crate::error::{ConfigEntriesError, ConfigEntriesResult};
use crate::hass::HomeAssistant;
use crate::integration::Integration;
use crate::platform::{EntityPlatform, Platform};
use crate::storage::{Storable, Storage, StorageResult};

/// Storage key for config entries
pub const STORAGE_KEY: &str = "core.config_entries";
/// Current storage version
pub const STORAGE_VERSION: u32 = 1;
/// Current minor version
pub const STORAGE_MINOR_VERSION: u32 = 5;

/// Config entries data for storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigEntriesData {
    pub entries: Vec<ConfigEntry>,
}

impl Storable for ConfigEntriesData {
    const KEY: &'static str = STORAGE_KEY;
    const VERSION: u32 = STORAGE_VERSION;
    const MINOR_VERSION: u32 = STORAGE_MINOR_VERSION;
}

/// Config Entries Manager
///
/// Manages the lifecycle of configuration entries including:
/// - Loading/saving from storage
/// - Entry creation, update and removal
/// - Setup/unload through the registered [`Integration`]
/// - Forwarding entries to [`EntityPlatform`]s
pub struct ConfigEntries {
    storage: Arc<Storage>,

    /// Primary index: entry_id -> ConfigEntry
    entries: DashMap<String, ConfigEntry>,

    /// Index: domain -> set of entry_ids
    by_domain: DashMap<String, HashSet<String>>,

    /// Index: (domain, unique_id) -> entry_id
    by_unique_id: DashMap<(String, String), String>,

    /// Serialises setup/unload of entries
    setup_lock: Mutex<()>,

    /// Serialises writes of the storage file
    save_lock: Mutex<()>,

    integrations: DashMap<String, Arc<dyn Integration>>,

    platforms: DashMap<(String, Platform), Arc<dyn EntityPlatform>>,

    /// entry_id -> platforms the entry is currently forwarded to
    forwarded: DashMap<String, HashSet<Platform>>,

    /// entry_id -> number of scheduled forwards still running
    pending_forwards: DashMap<String, Arc<watch::Sender<usize>>>,
}

/// Counts one scheduled forward of an entry as running until dropped
struct PendingForward(Arc<watch::Sender<usize>>);

impl PendingForward {
    fn start(counter: Arc<watch::Sender<usize>>) -> Self {
        counter.send_modify(|count| *count += 1);
        Self(counter)
    }
}

impl Drop for PendingForward {
    fn drop(&mut self) {
        self.0.send_modify(|count| *count -= 1);
    }
}

impl ConfigEntries {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            entries: DashMap::new(),
            by_domain: DashMap::new(),
            by_unique_id: DashMap::new(),
            setup_lock: Mutex::new(()),
            save_lock: Mutex::new(()),
            integrations: DashMap::new(),
            platforms: DashMap::new(),
            forwarded: DashMap::new(),
            pending_forwards: DashMap::new(),
        }
    }

    /// Load entries from storage
    pub async fn load(&self) -> StorageResult<()> {
        if let Some(storage_file) = self.storage.load::<ConfigEntriesData>().await? {
            info!(
                "Loading {} config entries from storage (v{}.{})",
                storage_file.data.entries.len(),
                storage_file.version,
                storage_file.minor_version
            );

            for entry in storage_file.data.entries {
                self.index_entry(&entry);
            }
        }
        Ok(())
    }

    /// Save entries to storage
    pub async fn save(&self) -> StorageResult<()> {
        let _lock = self.save_lock.lock().await;
        let data = ConfigEntriesData {
            entries: self.iter().collect(),
        };
        self.storage.save(&data).await?;
        debug!("Saved {} config entries to storage", data.entries.len());
        Ok(())
    }

    fn index_entry(&self, entry: &ConfigEntry) {
        let entry_id = entry.entry_id.clone();

        self.entries.insert(entry_id.clone(), entry.clone());

        self.by_domain
            .entry(entry.domain.clone())
            .or_default()
            .insert(entry_id.clone());

        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .insert((entry.domain.clone(), unique_id.clone()), entry_id);
        }
    }

    fn unindex_entry(&self, entry: &ConfigEntry) {
        if let Some(mut ids) = self.by_domain.get_mut(&entry.domain) {
            ids.remove(&entry.entry_id);
        }

        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .remove(&(entry.domain.clone(), unique_id.clone()));
        }

        self.entries.remove(&entry.entry_id);
    }

    /// Get an entry by ID
    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    /// Get all entries for a domain
    pub fn get_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        let ids: Vec<String> = self
            .by_domain
            .get(domain)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        let mut entries: Vec<ConfigEntry> = ids.iter().filter_map(|id| self.get(id)).collect();
        entries.sort_by_key(|e| e.created_at);
        entries
    }

    /// Get entry by unique_id
    pub fn get_by_unique_id(&self, domain: &str, unique_id: &str) -> Option<ConfigEntry> {
        let entry_id = self
            .by_unique_id
            .get(&(domain.to_string(), unique_id.to_string()))
            .map(|r| r.value().clone())?;
        self.get(&entry_id)
    }

    /// Add a new config entry
    pub async fn add(&self, entry: ConfigEntry) -> ConfigEntriesResult<ConfigEntry> {
        if let Some(ref unique_id) = entry.unique_id {
            if self.get_by_unique_id(&entry.domain, unique_id).is_some() {
                return Err(ConfigEntriesError::AlreadyExists {
                    domain: entry.domain.clone(),
                    unique_id: unique_id.clone(),
                });
            }
        }

        self.index_entry(&entry);
        self.save().await?;

        info!(
            "Added config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry.entry_id
        );

        Ok(entry)
    }

    /// Update an existing entry and persist it
    pub async fn update(
        &self,
        entry_id: &str,
        update: ConfigEntryUpdate,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if let Some(Some(ref unique_id)) = update.unique_id {
            if let Some(other) = self.get_by_unique_id(&entry.domain, unique_id) {
                if other.entry_id != entry.entry_id {
                    return Err(ConfigEntriesError::AlreadyExists {
                        domain: entry.domain.clone(),
                        unique_id: unique_id.clone(),
                    });
                }
            }
        }

        self.unindex_entry(&entry);

        let mut updated = entry;
        if let Some(title) = update.title {
            updated.title = title;
        }
        if let Some(data) = update.data {
            updated.data = data;
        }
        if let Some(options) = update.options {
            updated.options = options;
        }
        if let Some(unique_id) = update.unique_id {
            updated.unique_id = unique_id;
        }
        if let Some(pref) = update.pref_disable_new_entities {
            updated.pref_disable_new_entities = pref;
        }
        if let Some(pref) = update.pref_disable_polling {
            updated.pref_disable_polling = pref;
        }
        updated.modified_at = Utc::now();

        self.index_entry(&updated);
        self.save().await?;

        debug!("Updated config entry: {}", entry_id);
        Ok(updated)
    }

    /// Remove an entry, unloading it first
    pub async fn remove(
        &self,
        hass: &HomeAssistant,
        entry_id: &str,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if entry.state.is_recoverable() {
            self.unload(hass, entry_id).await?;
        }

        self.unindex_entry(&entry);
        self.forwarded.remove(entry_id);
        self.pending_forwards.remove(entry_id);
        self.save().await?;

        info!(
            "Removed config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry_id
        );

        Ok(entry)
    }

    /// Move an entry to a new lifecycle state, enforcing the state machine
    fn transition(
        &self,
        entry_id: &str,
        state: ConfigEntryState,
        reason: Option<String>,
    ) -> ConfigEntriesResult<()> {
        let mut entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        entry.try_set_state(state, reason)?;
        debug!("Entry {} state changed to {:?}", entry_id, state);
        Ok(())
    }

    /// Register an integration's lifecycle hooks under its domain
    pub fn register_integration(&self, integration: Arc<dyn Integration>) {
        let domain = integration.domain().to_string();
        debug!("Registered integration: {}", domain);
        self.integrations.insert(domain, integration);
    }

    pub fn integration(&self, domain: &str) -> Option<Arc<dyn Integration>> {
        self.integrations.get(domain).map(|r| r.value().clone())
    }

    /// Register the handler for one of a domain's entity platforms
    pub fn register_platform(
        &self,
        domain: &str,
        platform: Platform,
        handler: Arc<dyn EntityPlatform>,
    ) {
        self.platforms
            .insert((domain.to_string(), platform), handler);
        debug!("Registered platform {} for domain {}", platform, domain);
    }

    /// Set up an entry through its integration.
    ///
    /// Integration errors move the entry to `SetupError` and come back as
    /// [`ConfigEntriesError::SetupFailed`] with the integration's error as source.
    pub async fn setup(&self, hass: &HomeAssistant, entry_id: &str) -> ConfigEntriesResult<bool> {
        let _lock = self.setup_lock.lock().await;

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if entry.is_disabled() {
            debug!("Skipping setup for disabled entry: {}", entry_id);
            return Ok(false);
        }

        self.transition(entry_id, ConfigEntryState::SetupInProgress, None)?;

        let Some(integration) = self.integration(&entry.domain) else {
            self.transition(
                entry_id,
                ConfigEntryState::SetupError,
                Some("Integration not found".to_string()),
            )?;
            return Err(ConfigEntriesError::IntegrationNotFound(entry.domain));
        };

        match integration.setup_entry(hass, &entry).await {
            Ok(true) => {
                self.transition(entry_id, ConfigEntryState::Loaded, None)?;
                info!("Setup completed for entry: {} ({})", entry.title, entry_id);
                Ok(true)
            }
            Ok(false) => {
                warn!("Setup of entry {} returned false", entry_id);
                self.transition(
                    entry_id,
                    ConfigEntryState::SetupError,
                    Some("Setup returned false".to_string()),
                )?;
                Ok(false)
            }
            Err(source) => {
                warn!("Setup failed for entry {}: {}", entry_id, source);
                self.transition(
                    entry_id,
                    ConfigEntryState::SetupError,
                    Some(source.to_string()),
                )?;
                Err(ConfigEntriesError::SetupFailed {
                    entry_id: entry_id.to_string(),
                    source,
                })
            }
        }
    }

    /// Unload an entry through its integration.
    ///
    /// Entries that never finished setup return to `NotLoaded` without
    /// calling the integration.
    pub async fn unload(&self, hass: &HomeAssistant, entry_id: &str) -> ConfigEntriesResult<bool> {
        let _lock = self.setup_lock.lock().await;

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        match entry.state {
            ConfigEntryState::NotLoaded => return Ok(true),
            ConfigEntryState::Loaded => {}
            ConfigEntryState::SetupError => {
                self.transition(entry_id, ConfigEntryState::UnloadInProgress, None)?;
                self.transition(entry_id, ConfigEntryState::NotLoaded, None)?;
                return Ok(true);
            }
            state => return Err(ConfigEntriesError::CannotUnload(state)),
        }

        // Forwards scheduled by the setup must land before they can be unloaded
        self.wait_for_forwards(entry_id).await;

        self.transition(entry_id, ConfigEntryState::UnloadInProgress, None)?;

        let Some(integration) = self.integration(&entry.domain) else {
            self.transition(entry_id, ConfigEntryState::NotLoaded, None)?;
            return Ok(true);
        };

        match integration.unload_entry(hass, &entry).await {
            Ok(true) => {
                self.transition(entry_id, ConfigEntryState::NotLoaded, None)?;
                info!("Unloaded entry: {} ({})", entry.title, entry_id);
                Ok(true)
            }
            Ok(false) => {
                warn!("Unload of entry {} returned false", entry_id);
                self.transition(
                    entry_id,
                    ConfigEntryState::FailedUnload,
                    Some("Unload returned false".to_string()),
                )?;
                Ok(false)
            }
            Err(source) => {
                warn!("Unload failed for entry {}: {}", entry_id, source);
                self.transition(
                    entry_id,
                    ConfigEntryState::FailedUnload,
                    Some(source.to_string()),
                )?;
                Err(ConfigEntriesError::UnloadFailed {
                    entry_id: entry_id.to_string(),
                    source,
                })
            }
        }
    }

    /// Reload an entry (unload + setup)
    pub async fn reload(&self, hass: &HomeAssistant, entry_id: &str) -> ConfigEntriesResult<bool> {
        if !self.unload(hass, entry_id).await? {
            return Ok(false);
        }
        self.setup(hass, entry_id).await
    }

    /// Schedule forwarding of the entry to every platform in `platforms`.
    ///
    /// The forwards run concurrently as one host task. [`unload`](Self::unload)
    /// waits for them, so an entry unloaded right after setup does not keep
    /// platforms that were still being set up.
    pub fn forward_entry_setups(
        &self,
        hass: &HomeAssistant,
        entry: &ConfigEntry,
        platforms: &[Platform],
    ) {
        let counter = self
            .pending_forwards
            .entry(entry.entry_id.clone())
            .or_insert_with(|| Arc::new(watch::channel(0).0))
            .value()
            .clone();
        let pending = PendingForward::start(counter);

        let task_hass = hass.clone();
        let entry = entry.clone();
        let platforms = platforms.to_vec();
        hass.create_task(async move {
            let _pending = pending;
            let results = join_all(platforms.iter().map(|&platform| {
                task_hass
                    .config_entries
                    .forward_entry_setup(&task_hass, &entry, platform)
            }))
            .await;

            for (platform, result) in platforms.iter().zip(results) {
                if let Err(err) = result {
                    error!("Error setting up {} for {}: {}", platform, entry.entry_id, err);
                }
            }
        });
    }

    async fn wait_for_forwards(&self, entry_id: &str) {
        let Some(mut pending) = self
            .pending_forwards
            .get(entry_id)
            .map(|counter| counter.subscribe())
        else {
            return;
        };
        if pending.wait_for(|count| *count == 0).await.is_ok() {
            debug!("No forwards pending for entry {}", entry_id);
        }
    }

    /// Set up the entry's entities on one platform
    pub async fn forward_entry_setup(
        &self,
        hass: &HomeAssistant,
        entry: &ConfigEntry,
        platform: Platform,
    ) -> ConfigEntriesResult<()> {
        let handler = self
            .platforms
            .get(&(entry.domain.clone(), platform))
            .map(|r| r.value().clone())
            .ok_or_else(|| ConfigEntriesError::PlatformNotFound {
                domain: entry.domain.clone(),
                platform,
            })?;

        handler
            .setup_entry(hass, entry)
            .await
            .map_err(|source| ConfigEntriesError::PlatformFailed {
                platform,
                entry_id: entry.entry_id.clone(),
                source,
            })?;

        self.forwarded
            .entry(entry.entry_id.clone())
            .or_default()
            .insert(platform);
        debug!("Forwarded entry {} to {}", entry.entry_id, platform);
        Ok(())
    }

    /// Unload the entry's entities from one platform.
    ///
    /// A platform the entry was never forwarded to counts as unloaded.
    pub async fn forward_entry_unload(
        &self,
        hass: &HomeAssistant,
        entry: &ConfigEntry,
        platform: Platform,
    ) -> ConfigEntriesResult<bool> {
        let forwarded = self
            .forwarded
            .get(&entry.entry_id)
            .is_some_and(|p| p.contains(&platform));
        if !forwarded {
            return Ok(true);
        }

        let Some(handler) = self
            .platforms
            .get(&(entry.domain.clone(), platform))
            .map(|r| r.value().clone())
        else {
            return Ok(true);
        };

        let unloaded = handler
            .unload_entry(hass, entry)
            .await
            .map_err(|source| ConfigEntriesError::PlatformFailed {
                platform,
                entry_id: entry.entry_id.clone(),
                source,
            })?;

        if unloaded {
            if let Some(mut platforms) = self.forwarded.get_mut(&entry.entry_id) {
                platforms.remove(&platform);
            }
            self.forwarded
                .remove_if(&entry.entry_id, |_, platforms| platforms.is_empty());
            debug!("Unloaded entry {} from {}", entry.entry_id, platform);
        } else {
            warn!("Platform {} did not unload entry {}", platform, entry.entry_id);
        }
        Ok(unloaded)
    }

    /// Platforms the entry is currently forwarded to, in name order
    pub fn loaded_platforms(&self, entry_id: &str) -> Vec<Platform> {
        let mut platforms: Vec<Platform> = self
            .forwarded
            .get(entry_id)
            .map(|p| p.iter().copied().collect())
            .unwrap_or_default();
        platforms.sort();
        platforms
    }

    /// Get all entry IDs
    pub fn entry_ids(&self) -> Vec<String> {
        self.entries.iter().map(|r| r.key().clone()).collect()
    }

    /// Get count of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries
    pub fn iter(&self) -> impl Iterator<Item = ConfigEntry> + '_ {
        self.entries.iter().map(|r| r.value().clone())
    }
}
