//! Top-level view of a loaded `configuration.yaml`

use crate::error::{ConfigError, ConfigResult};
use serde_yaml::{Mapping, Value};

/// The resolved top-level configuration, keyed by integration domain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HomeAssistantConfig {
    root: Mapping,
}

impl HomeAssistantConfig {
    /// Wrap a resolved YAML document; an empty document is an empty config
    pub fn from_value(value: Value) -> ConfigResult<Self> {
        match value {
            Value::Mapping(root) => Ok(Self { root }),
            Value::Null => Ok(Self::default()),
            other => Err(ConfigError::InvalidValue {
                key: "<root>".to_string(),
                reason: format!("expected a mapping, found {}", type_name(&other)),
            }),
        }
    }

    /// Whether the domain has a section, including an empty `domain:` line
    pub fn contains_domain(&self, domain: &str) -> bool {
        self.root.contains_key(domain)
    }

    /// The section for a domain; an empty section is `Value::Null`
    pub fn domain(&self, domain: &str) -> Option<&Value> {
        self.root.get(domain)
    }

    /// Domains configured at the top level
    pub fn domains(&self) -> impl Iterator<Item = &str> + '_ {
        self.root.keys().filter_map(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}
