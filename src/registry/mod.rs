//! Build lifecycle registrars
//!
//! The orchestrating runner drives one registry per run:
//! 1. [`MetadataRegistry::populate_iteration`] once, before any build starts
//! 2. [`MetadataRegistry::start_build`] before each build executes
//! 3. [`MetadataRegistry::complete_build`] after each build, whether or not it
//!    succeeded
//!
//! Population order and single invocation are the caller's responsibility;
//! registries do not track which phase they are in.

mod error;
mod json;

pub use error::{RegistryError, SetupPhase};
pub use json::JsonMetadataRegistry;

use std::error::Error;

use crate::artifact::Artifact;
use crate::bucket::{BucketFactory, BuildCompletion};
use crate::cancel::CancelToken;
use crate::config::RegistryConfig;
use crate::diagnostic::Diagnostics;
use crate::template::BuildConfiguration;

/// Lifecycle operations the build runner calls
pub trait MetadataRegistry: Sync {
    /// Validate, initialize and populate the iteration, stopping at the first failure
    fn populate_iteration(&mut self, cancel: &CancelToken) -> Result<(), RegistryError>;

    /// Mark `build` as in progress
    fn start_build(&self, cancel: &CancelToken, build: &str) -> Result<(), RegistryError>;

    /// Relay a finished build and hand back whatever artifacts the registry returns
    fn complete_build(
        &self,
        cancel: &CancelToken,
        build: &str,
        artifacts: Vec<Artifact>,
        build_err: Option<&(dyn Error + Send + Sync + 'static)>,
    ) -> BuildCompletion<RegistryError>;
}

/// Registry used when tracking is disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRegistry;

impl MetadataRegistry for NullRegistry {
    fn populate_iteration(&mut self, _cancel: &CancelToken) -> Result<(), RegistryError> {
        Ok(())
    }

    fn start_build(&self, _cancel: &CancelToken, _build: &str) -> Result<(), RegistryError> {
        Ok(())
    }

    fn complete_build(
        &self,
        _cancel: &CancelToken,
        _build: &str,
        artifacts: Vec<Artifact>,
        _build_err: Option<&(dyn Error + Send + Sync + 'static)>,
    ) -> BuildCompletion<RegistryError> {
        BuildCompletion::ok(artifacts)
    }
}

/// Pick the registry for a run.
///
/// Returns a [`NullRegistry`] when `registry` has tracking disabled, otherwise
/// a [`JsonMetadataRegistry`] with every declared build registered.
///
/// This is the library entry point for callers that only drive the lifecycle.
/// Callers that need the concrete bucket afterwards, such as the `dry-run`
/// command reporting a bucket snapshot, build a [`JsonMetadataRegistry`]
/// directly.
pub fn new<'a, C, F>(
    configuration: &'a C,
    factory: &F,
    registry: &RegistryConfig,
) -> Result<Box<dyn MetadataRegistry + 'a>, Diagnostics>
where
    C: BuildConfiguration + ?Sized,
    F: BucketFactory,
    F::Bucket: 'a,
{
    if !registry.is_enabled() {
        tracing::debug!("Registry tracking disabled");
        return Ok(Box::new(NullRegistry));
    }

    let json = JsonMetadataRegistry::new(configuration, factory)?;
    Ok(Box::new(json))
}
