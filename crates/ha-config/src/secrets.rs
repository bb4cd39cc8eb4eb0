//! `secrets.yaml` lookup for `!secret` tags

use crate::error::{ConfigError, ConfigResult};
use serde_yaml::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the secrets store inside the config directory
pub const SECRETS_FILE: &str = "secrets.yaml";

/// Secrets loaded from `secrets.yaml`
///
/// Values are flattened to strings on load so account passwords that happen
/// to look numeric (`password: 123456`) survive substitution unchanged.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    secrets: HashMap<String, String>,
    path: PathBuf,
}

impl Secrets {
    /// Load secrets from `<config_dir>/secrets.yaml`
    ///
    /// A missing file yields an empty store; a `!secret` lookup against it
    /// then fails with [`ConfigError::SecretNotFound`].
    pub fn load(config_dir: &Path) -> ConfigResult<Self> {
        let path = config_dir.join(SECRETS_FILE);

        if !path.exists() {
            debug!("No {} at {:?}, using empty secrets", SECRETS_FILE, path);
            return Ok(Self {
                secrets: HashMap::new(),
                path,
            });
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        let raw: HashMap<String, Value> =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseYaml {
                path: path.clone(),
                source: e,
            })?;

        let secrets: HashMap<String, String> = raw
            .into_iter()
            .map(|(k, v)| (k, scalar_to_string(v)))
            .collect();

        debug!("Loaded {} secrets from {:?}", secrets.len(), path);

        Ok(Self { secrets, path })
    }

    /// Get a secret by key
    pub fn get(&self, key: &str) -> ConfigResult<&str> {
        self.secrets
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::SecretNotFound {
                key: key.to_string(),
            })
    }

    /// Check if a secret exists
    pub fn contains(&self, key: &str) -> bool {
        self.secrets.contains_key(key)
    }

    /// Path the secrets were (or would have been) loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

fn scalar_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(&other)
            .unwrap_or_default()
            .trim()
            .to_string(),
    }
}
