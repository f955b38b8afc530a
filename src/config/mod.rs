//! Registry configuration
//!
//! Settings are merged from three layers, last wins:
//! 1. Built-in defaults
//! 2. Process environment (`HCP_PACKER_*`)
//! 3. Explicit overrides (CLI flags)

mod defaults;
mod env;
mod merge;
mod registry;

pub use defaults::BuiltinDefaults;
pub use env::{
    env_layer, parse_labels, parse_toggle, ENV_BUCKET_DESCRIPTION, ENV_BUCKET_LABELS,
    ENV_BUCKET_NAME, ENV_BUILD_FINGERPRINT, ENV_BUILD_LABELS, ENV_REGISTRY,
};
pub use merge::{deep_merge, merge_layers};
pub use registry::{ConfigError, ConfigOrigin, EffectiveRegistryConfig, RegistryConfig};
