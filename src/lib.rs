//! HCP Registrar - build lifecycle tracking for legacy JSON templates
//!
//! Sits between a legacy JSON build template and a remote metadata registry
//! that tracks iterations of builds. A registrar registers every declared
//! build in a bucket, populates the iteration once per run, then relays each
//! build's start and completion to the bucket.

pub mod artifact;
pub mod bucket;
pub mod cancel;
pub mod config;
pub mod diagnostic;
pub mod registry;
pub mod runner;
pub mod template;

pub use artifact::Artifact;
pub use bucket::{Bucket, BucketError, BucketFactory, BuildCompletion, BuildError, MemoryBucket};
pub use cancel::{CancelToken, Cancelled};
pub use config::{EffectiveRegistryConfig, RegistryConfig};
pub use diagnostic::{Diagnostic, Diagnostics, Severity};
pub use registry::{JsonMetadataRegistry, MetadataRegistry, NullRegistry, RegistryError};
pub use runner::{run_builds, BuildOutcome, RunSummary};
pub use template::{BuildConfiguration, ResolveError};
