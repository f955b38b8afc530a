//! Bucket errors

use crate::cancel::Cancelled;

/// Errors reported by a bucket
#[derive(Debug, thiserror::Error)]
pub enum BucketError {
    #[error("Invalid bucket configuration: {0}")]
    InvalidConfig(String),

    #[error("No build fingerprint; set HCP_PACKER_BUILD_FINGERPRINT")]
    MissingFingerprint,

    #[error("Bucket has not been initialized")]
    NotInitialized,

    #[error("Iteration has not been populated")]
    NotPopulated,

    #[error("Build {0:?} is not registered in the iteration")]
    UnknownBuild(String),

    #[error("Build {0:?} is already done for this iteration")]
    BuildAlreadyDone(String),

    #[error("Build {0:?} failed, not uploading artifacts")]
    BuildFailed(String),

    #[error("Registry call cancelled")]
    Cancelled(#[from] Cancelled),

    #[error("Registry error: {0}")]
    Remote(String),
}

impl BucketError {
    /// Whether the build was skipped because a previous run already completed it
    pub fn is_already_done(&self) -> bool {
        matches!(self, BucketError::BuildAlreadyDone(_))
    }
}
