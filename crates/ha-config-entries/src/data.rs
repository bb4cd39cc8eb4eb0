//! Per-domain shared state
//!
//! Integrations keep their runtime objects (clients, coordinators) here so
//! their platforms can reach them. The store lives in the [`HomeAssistant`]
//! context of one installation; nothing is process-global.
//!
//! [`HomeAssistant`]: crate::HomeAssistant

use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;

use crate::error::{ConfigEntriesError, ConfigEntriesResult};

type Slot = Arc<dyn Any + Send + Sync>;

/// Keyed storage, one typed slot per domain
#[derive(Default)]
pub struct HassData {
    slots: DashMap<String, Slot>,
}

impl HassData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the slot for `key`, creating it with `init` if absent
    pub fn get_or_insert_with<T, F>(&self, key: &str, init: F) -> ConfigEntriesResult<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        let slot = self
            .slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(init()) as Slot)
            .value()
            .clone();
        downcast(key, slot)
    }

    /// Get the slot for `key` if one was created
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> ConfigEntriesResult<Option<Arc<T>>> {
        // Clone out of the map before downcasting so no shard lock is held
        let slot = self.slots.get(key).map(|r| r.value().clone());
        slot.map(|slot| downcast(key, slot)).transpose()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Drop the slot for `key`; returns whether it existed
    pub fn remove(&self, key: &str) -> bool {
        self.slots.remove(key).is_some()
    }
}

fn downcast<T: Any + Send + Sync>(key: &str, slot: Slot) -> ConfigEntriesResult<Arc<T>> {
    slot.downcast::<T>()
        .map_err(|_| ConfigEntriesError::DataTypeMismatch {
            key: key.to_string(),
        })
}
