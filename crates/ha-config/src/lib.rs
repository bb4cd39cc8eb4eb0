//! Legacy YAML configuration for Home Assistant
//!
//! Integrations that still accept a `configuration.yaml` section read it
//! through this crate. The loader understands the subset of Home Assistant
//! tags that credential-bearing sections rely on:
//!
//! - `!secret key` - Substitute from secrets.yaml
//! - `!include path` - Include another YAML file
//! - `!env_var VAR [default]` - Environment variable substitution
//!
//! # Example
//!
//! ```ignore
//! use ha_config::load_configuration;
//!
//! let config = load_configuration("/config")?;
//! if let Some(section) = config.domain("wyzeapi") {
//!     // ...
//! }
//! ```

mod error;
mod hass_config;
mod loader;
mod secrets;

pub use error::{ConfigError, ConfigResult};
pub use hass_config::HomeAssistantConfig;
pub use loader::{load_configuration, ConfigLoader, CONFIGURATION_FILE};
pub use secrets::{Secrets, SECRETS_FILE};

// Re-export serde_yaml::Value for convenience
pub use serde_yaml::Value;
