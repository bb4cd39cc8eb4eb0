//! Runtime data the integration keeps in the installation's shared state

use dashmap::DashMap;
use ha_config_entries::HomeAssistant;
use std::sync::Arc;

use crate::client::WyzeClient;
use crate::constants::DOMAIN;

/// What one loaded entry owns
#[derive(Clone)]
pub struct WyzeEntryData {
    pub client: Arc<dyn WyzeClient>,
}

/// The `wyzeapi` slot of [`HassData`](ha_config_entries::HassData), keyed by entry id
#[derive(Default)]
pub struct WyzeData {
    entries: DashMap<String, WyzeEntryData>,
}

impl WyzeData {
    /// Store an entry's data, returning what was stored before
    pub fn insert(&self, entry_id: &str, data: WyzeEntryData) -> Option<WyzeEntryData> {
        self.entries.insert(entry_id.to_string(), data)
    }

    pub fn get(&self, entry_id: &str) -> Option<WyzeEntryData> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    pub fn client(&self, entry_id: &str) -> Option<Arc<dyn WyzeClient>> {
        self.get(entry_id).map(|data| data.client)
    }

    pub fn remove(&self, entry_id: &str) -> Option<WyzeEntryData> {
        self.entries.remove(entry_id).map(|(_, data)| data)
    }

    pub fn contains(&self, entry_id: &str) -> bool {
        self.entries.contains_key(entry_id)
    }

    pub fn entry_ids(&self) -> Vec<String> {
        self.entries.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The client of a loaded entry, for use by the entity platforms
pub fn client_for_entry(hass: &HomeAssistant, entry_id: &str) -> Option<Arc<dyn WyzeClient>> {
    hass.data
        .get::<WyzeData>(DOMAIN)
        .ok()
        .flatten()?
        .client(entry_id)
}
