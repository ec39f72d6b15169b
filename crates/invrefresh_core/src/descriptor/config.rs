//! Declarative registry configuration.

use super::Descriptor;
use crate::error::CoreResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Serialized form of a registry.
///
/// ```rust
/// use invrefresh_core::{Registry, RegistryConfig};
///
/// let config = RegistryConfig::from_json(r#"{
///     "descriptors": [{
///         "entity_type": "switches",
///         "table": "switches",
///         "natural_key": [{"kind": "scalar", "name": "uid_ems"}]
///     }]
/// }"#).unwrap();
/// let registry = Registry::from_config(config).unwrap();
/// assert!(registry.contains("switches"));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Descriptors in registration order.
    #[serde(default)]
    pub descriptors: Vec<Descriptor>,
}

impl RegistryConfig {
    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`](crate::CoreError::InvalidConfig)
    /// if the document is malformed.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`](crate::CoreError::InvalidConfig)
    /// if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        tracing::debug!(path = %path.display(), descriptors = config.descriptors.len(), "loaded registry config");
        Ok(config)
    }

    /// Serializes the configuration as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`](crate::CoreError::InvalidConfig)
    /// if serialization fails.
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
