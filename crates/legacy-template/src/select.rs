//! `only` / `except` build selection.

use globset::{Glob, GlobSet, GlobSetBuilder};

/// Error compiling a selection pattern.
#[derive(Debug, thiserror::Error)]
#[error("invalid build pattern {pattern:?}: {source}")]
pub struct SelectError {
    pub pattern: String,
    #[source]
    pub source: globset::Error,
}

/// Glob-based build filter.
///
/// When `only` is non-empty it wins and `except` is ignored.
#[derive(Debug, Clone)]
pub struct BuildSelector {
    only: Option<GlobSet>,
    except: Option<GlobSet>,
}

impl BuildSelector {
    /// Selector that keeps every build.
    pub fn all() -> Self {
        Self {
            only: None,
            except: None,
        }
    }

    /// Compile `only` and `except` patterns.
    pub fn new(only: &[String], except: &[String]) -> Result<Self, SelectError> {
        Ok(Self {
            only: compile(only)?,
            except: compile(except)?,
        })
    }

    /// Whether the build named `name` is kept.
    pub fn is_selected(&self, name: &str) -> bool {
        if let Some(only) = &self.only {
            return only.is_match(name);
        }
        match &self.except {
            Some(except) => !except.is_match(name),
            None => true,
        }
    }
}

impl Default for BuildSelector {
    fn default() -> Self {
        Self::all()
    }
}

fn compile(patterns: &[String]) -> Result<Option<GlobSet>, SelectError> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| SelectError {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map(Some).map_err(|source| SelectError {
        pattern: patterns.join(","),
        source,
    })
}
