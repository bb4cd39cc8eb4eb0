//! Constants for the Wyze integration

use ha_config_entries::Platform;

/// Integration domain
pub const DOMAIN: &str = "wyzeapi";

pub const CONF_USERNAME: &str = "username";
pub const CONF_PASSWORD: &str = "password";

/// Platforms every entry is forwarded to, in forwarding order
pub const PLATFORMS: [Platform; 6] = [
    Platform::Light,
    Platform::Switch,
    Platform::BinarySensor,
    Platform::Lock,
    Platform::Climate,
    Platform::AlarmControlPanel,
];
