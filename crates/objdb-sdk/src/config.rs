//! Declarative database configuration, loadable from TOML.
//!
//! ```toml
//! namespace = "acme"
//!
//! [defaults]
//! behavior = "enforce-limits"
//! request_timeout_ms = 5000
//!
//! [[resources]]
//! name = "users"
//!
//! [resources.attributes]
//! name = "string|required"
//! region = "string"
//!
//! [resources.partitions.byRegion]
//! region = "string"
//!
//! [resources.config]
//! soft_delete = true
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use objdb_engine::ResourceConfig;
use objdb_partition::PartitionDefinition;
use objdb_schema::Schema;

use crate::error::{SdkError, SdkResult};

/// Everything needed to open a [`Database`](crate::Database) and register
/// its resources.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Key prefix shared by every resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Settings applied to every resource before its own overrides.
    #[serde(default)]
    pub defaults: ResourceConfig,
    #[serde(default)]
    pub resources: Vec<ResourceDefinition>,
}

impl DatabaseConfig {
    pub fn from_toml_str(input: &str) -> SdkResult<Self> {
        let config: Self = toml::from_str(input)?;
        config.defaults.check().map_err(SdkError::Config)?;
        for (i, def) in config.resources.iter().enumerate() {
            if config.resources[..i].iter().any(|d| d.name == def.name) {
                return Err(SdkError::DuplicateResource(def.name.clone()));
            }
        }
        Ok(config)
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceDefinition> {
        self.resources.iter().find(|d| d.name == name)
    }
}

/// A resource as written in configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceDefinition {
    pub name: String,
    /// Field name to rule string, or to a nested attribute map.
    pub attributes: Value,
    /// Partition name to `{field path -> rule}`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub partitions: BTreeMap<String, BTreeMap<String, String>>,
    /// Settings that differ from the database defaults. Keys are those of
    /// [`ResourceConfig`].
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,
}

impl ResourceDefinition {
    pub fn new(name: impl Into<String>, attributes: Value) -> Self {
        Self {
            name: name.into(),
            attributes,
            partitions: BTreeMap::new(),
            config: Map::new(),
        }
    }

    pub fn partition(mut self, name: &str, fields: &[(&str, &str)]) -> Self {
        let fields = fields
            .iter()
            .map(|(path, rule)| (path.to_string(), rule.to_string()))
            .collect();
        self.partitions.insert(name.to_string(), fields);
        self
    }

    /// Override one setting, e.g. `.set("soft_delete", true)`.
    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.config.insert(key.to_string(), value.into());
        self
    }

    pub fn schema(&self) -> SdkResult<Schema> {
        Ok(Schema::from_attributes(&self.attributes)?)
    }

    pub fn partition_definitions(&self) -> SdkResult<Vec<PartitionDefinition>> {
        self.partitions
            .iter()
            .map(|(name, fields)| PartitionDefinition::from_map(name, fields).map_err(SdkError::from))
            .collect()
    }

    /// `defaults` with this definition's overrides applied.
    pub fn effective_config(&self, defaults: &ResourceConfig) -> SdkResult<ResourceConfig> {
        if self.config.is_empty() {
            return Ok(defaults.clone());
        }
        let invalid = |e: serde_json::Error| SdkError::Config(format!("resource {}: {e}", self.name));

        let mut merged = match serde_json::to_value(defaults).map_err(invalid)? {
            Value::Object(map) => map,
            _ => return Err(SdkError::Config("defaults are not a map".into())),
        };
        for (key, value) in &self.config {
            if !merged.contains_key(key) {
                return Err(SdkError::Config(format!(
                    "resource {}: unknown setting {key}",
                    self.name
                )));
            }
            merged.insert(key.clone(), value.clone());
        }
        let config: ResourceConfig = serde_json::from_value(Value::Object(merged)).map_err(invalid)?;
        config
            .check()
            .map_err(|e| SdkError::Config(format!("resource {}: {e}", self.name)))?;
        Ok(config)
    }
}
