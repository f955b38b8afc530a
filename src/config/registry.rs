//! Effective registry configuration with provenance

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::defaults::BuiltinDefaults;
use super::env::env_layer;
use super::merge::merge_layers;

/// Errors loading registry configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: invalid value {value:?}, expected one of 1/0, on/off, true/false")]
    InvalidToggle { var: String, value: String },

    #[error("{var}: invalid label {entry:?}, expected key=value")]
    InvalidLabel { var: String, entry: String },

    #[error("Invalid registry configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Registry settings after merging all layers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Explicit on/off toggle; `None` when never set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_description: Option<String>,

    #[serde(default)]
    pub bucket_labels: BTreeMap<String, String>,

    #[serde(default)]
    pub build_labels: BTreeMap<String, String>,

    /// Fingerprint identifying the iteration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl RegistryConfig {
    /// Whether registry tracking is on.
    ///
    /// An explicit toggle always wins; otherwise naming a bucket turns it on.
    pub fn is_enabled(&self) -> bool {
        self.registry.unwrap_or(self.bucket_name.is_some())
    }
}

/// Origin of a contributing layer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    Env,
    Cli,
}

/// Merged configuration plus the layers it came from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveRegistryConfig {
    pub config: RegistryConfig,

    /// Contributing layers in precedence order
    pub sources: Vec<ConfigOrigin>,
}

impl EffectiveRegistryConfig {
    /// Merge defaults, the process environment and optional CLI overrides
    pub fn load(overrides: Option<Value>) -> Result<Self, ConfigError> {
        Self::build(|var| std::env::var(var).ok(), overrides)
    }

    /// Merge defaults, the environment seen through `lookup`, and overrides
    pub fn build<F>(lookup: F, overrides: Option<Value>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        let mut sources = vec![ConfigOrigin::Builtin];

        let env = env_layer(lookup)?;
        if env.as_object().is_some_and(|m| !m.is_empty()) {
            layers.push(env);
            sources.push(ConfigOrigin::Env);
        }

        if let Some(cli) = overrides {
            layers.push(cli);
            sources.push(ConfigOrigin::Cli);
        }

        let config = serde_json::from_value(merge_layers(layers))?;
        Ok(Self { config, sources })
    }
}
