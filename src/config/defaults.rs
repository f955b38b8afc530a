//! Built-in registry defaults (layer 1)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Built-in default registry settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Labels applied to the bucket (default: none)
    pub bucket_labels: BTreeMap<String, String>,

    /// Labels applied to every build (default: none)
    pub build_labels: BTreeMap<String, String>,
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging.
    ///
    /// The registry toggle, bucket name and fingerprint have no default and
    /// are left out so that absence stays distinguishable from an explicit value.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "bucket_labels": self.bucket_labels,
            "build_labels": self.build_labels,
        })
    }
}
