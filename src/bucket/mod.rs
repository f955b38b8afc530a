//! Bucket capability
//!
//! A bucket is one versioned collection of trackable build components in the
//! remote registry. The registrar only sequences calls against this trait;
//! transport, authentication and retries belong to implementations.
//!
//! Concurrency: `start_build`/`complete_build` take `&self` and may be called
//! concurrently for different components, never twice at once for the same
//! component. Setup operations take `&mut self` and run on a single owner.

mod error;
pub mod memory;

pub use error::BucketError;
pub use memory::{MemoryBucket, MemoryBucketFactory};

use std::error::Error;
use std::path::Path;

use crate::artifact::Artifact;
use crate::cancel::CancelToken;
use crate::diagnostic::Diagnostics;

/// Outcome a builder reports for its build
pub type BuildError = Box<dyn Error + Send + Sync + 'static>;

/// Artifacts handed back by a completion, paired with its error if any.
///
/// Artifacts are returned even when the completion fails so the caller can
/// still report what the build produced.
#[derive(Debug)]
pub struct BuildCompletion<E> {
    pub artifacts: Vec<Artifact>,
    pub error: Option<E>,
}

impl<E> BuildCompletion<E> {
    pub fn ok(artifacts: Vec<Artifact>) -> Self {
        Self {
            artifacts,
            error: None,
        }
    }

    pub fn failed(artifacts: Vec<Artifact>, error: E) -> Self {
        Self {
            artifacts,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn map_err<F, O>(self, op: O) -> BuildCompletion<F>
    where
        O: FnOnce(E) -> F,
    {
        BuildCompletion {
            artifacts: self.artifacts,
            error: self.error.map(op),
        }
    }

    /// Drop the artifacts when the completion failed
    pub fn into_result(self) -> Result<Vec<Artifact>, E> {
        match self.error {
            None => Ok(self.artifacts),
            Some(e) => Err(e),
        }
    }
}

/// Registry bucket operations consumed by the registrar
pub trait Bucket: Send + Sync {
    /// Track `component` in this bucket. Registering a name twice is a no-op.
    fn register_build_for_component(&mut self, component: &str);

    /// Check the bucket's local configuration before touching the registry
    fn validate(&self) -> Result<(), BucketError>;

    /// Create or fetch the bucket and its iteration in the registry
    fn initialize(&mut self, cancel: &CancelToken) -> Result<(), BucketError>;

    /// Create the iteration's build entries for every registered component
    fn populate_iteration(&mut self, cancel: &CancelToken) -> Result<(), BucketError>;

    /// Mark `component` as running
    fn start_build(&self, cancel: &CancelToken, component: &str) -> Result<(), BucketError>;

    /// Finish `component`.
    ///
    /// With a `build_err` the bucket records a failed build instead of
    /// publishing; it decides which artifacts to hand back either way.
    fn complete_build(
        &self,
        cancel: &CancelToken,
        component: &str,
        artifacts: Vec<Artifact>,
        build_err: Option<&(dyn Error + Send + Sync + 'static)>,
    ) -> BuildCompletion<BucketError>;
}

/// Creates buckets rooted at a template's source directory
pub trait BucketFactory {
    type Bucket: Bucket;

    fn create(&self, source_dir: &Path) -> Result<Self::Bucket, Diagnostics>;
}
