//! Registrar errors

use std::fmt;

use crate::bucket::BucketError;
use crate::template::ResolveError;

/// Step of iteration population
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupPhase {
    Validate,
    Initialize,
    PopulateIteration,
}

impl fmt::Display for SetupPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SetupPhase::Validate => "bucket validation",
            SetupPhase::Initialize => "bucket initialization",
            SetupPhase::PopulateIteration => "iteration population",
        };
        f.write_str(s)
    }
}

/// Errors from iteration population and per-build lifecycle calls
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to get build {build:?}: {source}")]
    UnresolvedBuild {
        build: String,
        #[source]
        source: ResolveError,
    },

    #[error("{phase} failed: {source}")]
    Setup {
        phase: SetupPhase,
        #[source]
        source: BucketError,
    },

    #[error("failed to start build {build:?}: {source}")]
    StartBuild {
        build: String,
        #[source]
        source: BucketError,
    },

    #[error("failed to complete build {build:?}: {source}")]
    CompleteBuild {
        build: String,
        #[source]
        source: BucketError,
    },
}

impl RegistryError {
    /// Underlying bucket error, if the bucket reported this failure
    pub fn bucket_error(&self) -> Option<&BucketError> {
        match self {
            RegistryError::UnresolvedBuild { .. } => None,
            RegistryError::Setup { source, .. }
            | RegistryError::StartBuild { source, .. }
            | RegistryError::CompleteBuild { source, .. } => Some(source),
        }
    }

    /// Whether the build was already completed by an earlier run
    pub fn is_already_done(&self) -> bool {
        self.bucket_error().is_some_and(BucketError::is_already_done)
    }
}
