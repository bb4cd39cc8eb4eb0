//! Entity platforms an integration forwards its entries to

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::entry::ConfigEntry;
use crate::hass::HomeAssistant;

/// Host entity platform (entity category)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    AlarmControlPanel,
    BinarySensor,
    Camera,
    Climate,
    Cover,
    Fan,
    Light,
    Lock,
    Scene,
    Sensor,
    Switch,
}

impl Platform {
    pub const ALL: [Platform; 11] = [
        Platform::AlarmControlPanel,
        Platform::BinarySensor,
        Platform::Camera,
        Platform::Climate,
        Platform::Cover,
        Platform::Fan,
        Platform::Light,
        Platform::Lock,
        Platform::Scene,
        Platform::Sensor,
        Platform::Switch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::AlarmControlPanel => "alarm_control_panel",
            Platform::BinarySensor => "binary_sensor",
            Platform::Camera => "camera",
            Platform::Climate => "climate",
            Platform::Cover => "cover",
            Platform::Fan => "fan",
            Platform::Light => "light",
            Platform::Lock => "lock",
            Platform::Scene => "scene",
            Platform::Sensor => "sensor",
            Platform::Switch => "switch",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown platform: {0}")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPlatform(s.to_string()))
    }
}

/// One integration's implementation of an entity platform.
///
/// Registered per `(domain, platform)`; the host calls it when an entry of
/// that domain is forwarded.
#[async_trait]
pub trait EntityPlatform: Send + Sync {
    /// Create the platform's entities for the entry
    async fn setup_entry(&self, hass: &HomeAssistant, entry: &ConfigEntry) -> anyhow::Result<()>;

    /// Remove the platform's entities for the entry
    async fn unload_entry(&self, _hass: &HomeAssistant, _entry: &ConfigEntry) -> anyhow::Result<bool> {
        Ok(true)
    }
}
