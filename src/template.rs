//! Configuration adapter
//!
//! The registrar reads build names and canonical registry names through
//! [`BuildConfiguration`], so it does not depend on how a template is modelled.

use legacy_template::Template;
use std::error::Error;
use std::path::Path;

/// Failure resolving a build's canonical registry name
pub type ResolveError = Box<dyn Error + Send + Sync + 'static>;

/// Build configuration as seen by the registrar
pub trait BuildConfiguration: Sync {
    /// Directory the configuration was loaded from
    fn source_dir(&self) -> &Path;

    /// Every declared build identifier, in declaration order, ignoring any
    /// only/except selection
    fn build_names(&self) -> Vec<String>;

    /// Registry-compatible name for `build`
    fn canonical_name(&self, build: &str) -> Result<String, ResolveError>;
}

impl BuildConfiguration for Template {
    fn source_dir(&self) -> &Path {
        Template::source_dir(self)
    }

    fn build_names(&self) -> Vec<String> {
        self.all_build_names()
    }

    fn canonical_name(&self, build: &str) -> Result<String, ResolveError> {
        Ok(self.hcp_name(build)?)
    }
}
