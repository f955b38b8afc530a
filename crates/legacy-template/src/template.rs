//! Template model.

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::name::{is_compatible_segment, NameError};
use crate::select::BuildSelector;

/// A builder block declared in the template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Builder {
    /// Builder plugin type (e.g. `amazon-ebs`)
    pub builder_type: String,

    /// Build name; defaults to the builder type
    pub name: String,
}

/// Errors raised while loading a template.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Template is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Template declares no builders")]
    NoBuilders,

    #[error("Builder {index} is missing a 'type'")]
    MissingType { index: usize },

    #[error("Builder {index} has an empty name")]
    EmptyName { index: usize },
}

#[derive(Debug, Deserialize)]
struct RawTemplate {
    #[serde(default)]
    builders: Vec<RawBuilder>,
}

#[derive(Debug, Deserialize)]
struct RawBuilder {
    #[serde(rename = "type")]
    builder_type: Option<String>,

    name: Option<String>,
}

/// A loaded legacy JSON template.
#[derive(Debug, Clone)]
pub struct Template {
    path: PathBuf,
    builders: Vec<Builder>,
}

impl Template {
    /// Load a template from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, path)
    }

    /// Parse template contents. `path` is recorded as the template location.
    pub fn parse(contents: &str, path: impl Into<PathBuf>) -> Result<Self, TemplateError> {
        let raw: RawTemplate = serde_json::from_str(contents)?;
        if raw.builders.is_empty() {
            return Err(TemplateError::NoBuilders);
        }

        let mut builders = Vec::with_capacity(raw.builders.len());
        for (index, raw) in raw.builders.into_iter().enumerate() {
            let builder_type = match raw.builder_type {
                Some(t) if !t.is_empty() => t,
                _ => return Err(TemplateError::MissingType { index }),
            };
            let name = match raw.name {
                Some(n) if n.is_empty() => return Err(TemplateError::EmptyName { index }),
                Some(n) => n,
                None => builder_type.clone(),
            };
            builders.push(Builder { builder_type, name });
        }

        Ok(Self {
            path: path.into(),
            builders,
        })
    }

    /// Path the template was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the template.
    pub fn source_dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    /// Declared builders, in declaration order.
    pub fn builders(&self) -> &[Builder] {
        &self.builders
    }

    /// Names of the builds kept by `selector`, in declaration order.
    ///
    /// Duplicated names are returned as often as they are declared.
    pub fn build_names(&self, selector: &BuildSelector) -> Vec<String> {
        self.builders
            .iter()
            .filter(|b| selector.is_selected(&b.name))
            .map(|b| b.name.clone())
            .collect()
    }

    /// Names of every declared build, ignoring any selection.
    pub fn all_build_names(&self) -> Vec<String> {
        self.build_names(&BuildSelector::all())
    }

    /// Registry-compatible name of a build.
    ///
    /// The name is the builder type when the build is not renamed, and
    /// `type.name` otherwise.
    pub fn hcp_name(&self, build: &str) -> Result<String, NameError> {
        let builder = self
            .builders
            .iter()
            .find(|b| b.name == build)
            .ok_or_else(|| NameError::UnknownBuild(build.to_string()))?;

        for segment in [&builder.builder_type, &builder.name] {
            if !is_compatible_segment(segment) {
                return Err(NameError::Incompatible {
                    build: build.to_string(),
                    segment: segment.clone(),
                });
            }
        }

        if builder.name == builder.builder_type {
            Ok(builder.builder_type.clone())
        } else {
            Ok(format!("{}.{}", builder.builder_type, builder.name))
        }
    }
}
