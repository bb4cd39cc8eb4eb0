//! Account credentials, from YAML or from an entry

use ha_config::Value;
use ha_config_entries::ConfigData;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::json;
use std::fmt;

use crate::constants::{CONF_PASSWORD, CONF_USERNAME};
use crate::error::IntegrationError;

/// Wyze account credentials
///
/// Other keys of the `wyzeapi:` section are ignored.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct WyzeConfig {
    #[serde(deserialize_with = "scalar_string")]
    pub username: String,
    #[serde(deserialize_with = "scalar_string")]
    pub password: String,
}

/// Accept any YAML scalar, so `password: 123456` reads as `"123456"`
fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(de::Error::custom(format!(
            "expected a string, found {other:?}"
        ))),
    }
}

impl WyzeConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Parse the `wyzeapi:` section of configuration.yaml
    pub fn from_yaml(section: &Value) -> Result<Self, IntegrationError> {
        Ok(serde_yaml::from_value(section.clone())?)
    }

    /// Read the credentials stored in an entry's data (or flow input)
    pub fn from_data(data: &ConfigData) -> Result<Self, IntegrationError> {
        let field = |key: &'static str| {
            data.get(key)
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
                .ok_or(IntegrationError::MissingCredential(key))
        };
        Ok(Self {
            username: field(CONF_USERNAME)?,
            password: field(CONF_PASSWORD)?,
        })
    }

    /// Entry data holding exactly these credentials
    pub fn to_data(&self) -> ConfigData {
        ConfigData::from([
            (CONF_USERNAME.to_string(), json!(self.username)),
            (CONF_PASSWORD.to_string(), json!(self.password)),
        ])
    }

    /// Whether an entry's stored credentials are these
    pub fn matches(&self, data: &ConfigData) -> bool {
        data.get(CONF_USERNAME).and_then(serde_json::Value::as_str) == Some(self.username.as_str())
            && data.get(CONF_PASSWORD).and_then(serde_json::Value::as_str) == Some(self.password.as_str())
    }

    /// Unique id of the account's entry
    pub fn unique_id(&self) -> String {
        self.username.to_lowercase()
    }
}

impl fmt::Debug for WyzeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WyzeConfig")
            .field("username", &self.username)
            .field("password", &"**REDACTED**")
            .finish()
    }
}
