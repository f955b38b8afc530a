//! Build artifacts relayed between builders and the registry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// An artifact produced by a build.
///
/// The registrar never inspects artifacts; buckets decide whether they are
/// published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Identifier of the builder that produced the artifact
    pub builder_id: String,

    /// Provider-specific artifact id (image id, file name, ...)
    pub id: String,

    /// Files making up the artifact, if any
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,

    /// Free-form metadata (region, provider, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Artifact {
    pub fn new(builder_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            builder_id: builder_id.into(),
            id: id.into(),
            files: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.files.push(file.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.builder_id)
    }
}
