//! `configuration.yaml` loader with custom tag support

use crate::error::{ConfigError, ConfigResult};
use crate::hass_config::HomeAssistantConfig;
use crate::secrets::Secrets;
use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Name of the top-level configuration file
pub const CONFIGURATION_FILE: &str = "configuration.yaml";

/// Load `<config_dir>/configuration.yaml` with secrets from the same directory
pub fn load_configuration(config_dir: impl Into<PathBuf>) -> ConfigResult<HomeAssistantConfig> {
    let mut loader = ConfigLoader::new(config_dir)?;
    let value = loader.load_file(CONFIGURATION_FILE)?;
    HomeAssistantConfig::from_value(value)
}

/// YAML loader that resolves `!secret`, `!include` and `!env_var`
pub struct ConfigLoader {
    config_dir: PathBuf,
    secrets: Secrets,
    /// Files currently being loaded, for circular include detection
    include_stack: HashSet<PathBuf>,
}

impl ConfigLoader {
    /// Create a loader for the given config directory, reading its secrets
    pub fn new(config_dir: impl Into<PathBuf>) -> ConfigResult<Self> {
        let config_dir = config_dir.into();
        let secrets = Secrets::load(&config_dir)?;
        Ok(Self::with_secrets(config_dir, secrets))
    }

    /// Create a loader with pre-loaded secrets
    pub fn with_secrets(config_dir: impl Into<PathBuf>, secrets: Secrets) -> Self {
        Self {
            config_dir: config_dir.into(),
            secrets,
            include_stack: HashSet::new(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn secrets(&self) -> &Secrets {
        &self.secrets
    }

    /// Load and resolve a YAML file, relative paths being taken from the config dir
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = if path.as_ref().is_absolute() {
            path.as_ref().to_path_buf()
        } else {
            self.config_dir.join(path)
        };
        debug!("Loading YAML file: {:?}", path);

        if self.include_stack.contains(&path) {
            return Err(ConfigError::CircularInclude { path });
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        self.include_stack.insert(path.clone());
        let result = self.load_str(&content, &path);
        self.include_stack.remove(&path);

        result
    }

    /// Parse and resolve YAML text; `source_path` anchors relative includes
    pub fn load_str(&mut self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: source_path.to_path_buf(),
            source: e,
        })?;

        self.resolve(value, source_path)
    }

    fn resolve(&mut self, value: Value, source_path: &Path) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => self.resolve_tagged(*tagged, source_path),
            Value::Mapping(map) => {
                let mut resolved = Mapping::with_capacity(map.len());
                for (k, v) in map {
                    resolved.insert(k, self.resolve(v, source_path)?);
                }
                Ok(Value::Mapping(resolved))
            }
            Value::Sequence(seq) => seq
                .into_iter()
                .map(|v| self.resolve(v, source_path))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::Sequence),
            other => Ok(other),
        }
    }

    fn resolve_tagged(&mut self, tagged: TaggedValue, source_path: &Path) -> ConfigResult<Value> {
        let tag = tagged.tag.to_string();
        trace!("Resolving tag '{}' with value {:?}", tag, tagged.value);

        match tag.as_str() {
            "!secret" => {
                let key = tag_argument(&tagged.value, "!secret")?;
                let secret = self.secrets.get(key)?;
                debug!("Substituted secret: {}", key);
                Ok(Value::String(secret.to_string()))
            }
            "!include" => {
                let target = tag_argument(&tagged.value, "!include").map_err(|_| {
                    ConfigError::InvalidIncludePath {
                        path: format!("{:?}", tagged.value),
                        reason: "path must be a string".to_string(),
                    }
                })?;
                let base = source_path.parent().unwrap_or(self.config_dir.as_path());
                let path = base.join(target);
                debug!("Including file: {:?}", path);
                self.load_file(path)
            }
            "!env_var" => {
                let arg = tag_argument(&tagged.value, "!env_var")?;
                let (var, default) = match arg.split_once(char::is_whitespace) {
                    Some((var, default)) => (var, Some(default.trim())),
                    None => (arg, None),
                };
                match (std::env::var(var), default) {
                    (Ok(v), _) => Ok(Value::String(v)),
                    (Err(_), Some(default)) => Ok(Value::String(default.to_string())),
                    (Err(_), None) => Err(ConfigError::EnvVarNotFound {
                        var: var.to_string(),
                    }),
                }
            }
            _ => {
                // Unknown tag, keep it but resolve what it wraps
                let inner = self.resolve(tagged.value, source_path)?;
                Ok(Value::Tagged(Box::new(TaggedValue {
                    tag: tagged.tag,
                    value: inner,
                })))
            }
        }
    }
}

fn tag_argument<'a>(value: &'a Value, tag: &str) -> ConfigResult<&'a str> {
    value.as_str().ok_or_else(|| ConfigError::InvalidValue {
        key: tag.to_string(),
        reason: "argument must be a string".to_string(),
    })
}
