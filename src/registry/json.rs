//! Registrar for legacy JSON templates

use std::error::Error;

use super::{MetadataRegistry, RegistryError, SetupPhase};
use crate::artifact::Artifact;
use crate::bucket::{Bucket, BucketError, BucketFactory, BuildCompletion};
use crate::cancel::CancelToken;
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::template::BuildConfiguration;

/// Tracks the builds of a legacy JSON template in one registry bucket.
///
/// Only obtainable through a construction that registered every declared
/// build; the bucket is owned for the rest of the run.
pub struct JsonMetadataRegistry<'a, C: BuildConfiguration + ?Sized, B: Bucket> {
    configuration: &'a C,
    bucket: B,
}

impl<'a, C: BuildConfiguration + ?Sized, B: Bucket> JsonMetadataRegistry<'a, C, B> {
    /// Derive a bucket rooted at the configuration's directory and register
    /// every declared build in it.
    pub fn new<F>(configuration: &'a C, factory: &F) -> Result<Self, Diagnostics>
    where
        F: BucketFactory<Bucket = B>,
    {
        let bucket = factory.create(configuration.source_dir())?;
        Self::with_bucket(configuration, bucket)
    }

    /// Register every declared build in an already derived bucket.
    ///
    /// Each build is attempted even when others fail to resolve. Any
    /// resolution failure fails the whole construction with one diagnostic
    /// per failing build.
    pub fn with_bucket(configuration: &'a C, mut bucket: B) -> Result<Self, Diagnostics> {
        let mut diags = Diagnostics::new();

        // Selection flags only decide what runs; every declared build is tracked.
        for build in configuration.build_names() {
            match configuration.canonical_name(&build) {
                Ok(component) => bucket.register_build_for_component(&component),
                Err(err) => {
                    tracing::warn!(build = %build, error = %err, "No registry name for build");
                    diags.push(
                        Diagnostic::error(
                            "No HCP name available",
                            format!(
                                "Failed to get a registry-compatible build name for build {:?}: {}.",
                                build, err
                            ),
                        )
                        .with_subject(build),
                    );
                }
            }
        }

        if diags.has_errors() {
            return Err(diags);
        }

        Ok(Self {
            configuration,
            bucket,
        })
    }

    pub fn bucket(&self) -> &B {
        &self.bucket
    }

    fn resolve(&self, build: &str) -> Result<String, RegistryError> {
        self.configuration
            .canonical_name(build)
            .map_err(|source| RegistryError::UnresolvedBuild {
                build: build.to_string(),
                source,
            })
    }
}

impl<'a, C: BuildConfiguration + ?Sized, B: Bucket> MetadataRegistry
    for JsonMetadataRegistry<'a, C, B>
{
    fn populate_iteration(&mut self, cancel: &CancelToken) -> Result<(), RegistryError> {
        let setup =
            |phase: SetupPhase| move |source: BucketError| RegistryError::Setup { phase, source };

        tracing::info!("Validating bucket configuration");
        self.bucket.validate().map_err(setup(SetupPhase::Validate))?;

        tracing::info!("Initializing bucket in registry");
        self.bucket
            .initialize(cancel)
            .map_err(setup(SetupPhase::Initialize))?;

        tracing::info!("Populating iteration metadata");
        self.bucket
            .populate_iteration(cancel)
            .map_err(setup(SetupPhase::PopulateIteration))
    }

    fn start_build(&self, cancel: &CancelToken, build: &str) -> Result<(), RegistryError> {
        let component = self.resolve(build)?;
        tracing::info!(build, component = %component, "Starting build");
        self.bucket
            .start_build(cancel, &component)
            .map_err(|source| RegistryError::StartBuild {
                build: build.to_string(),
                source,
            })
    }

    fn complete_build(
        &self,
        cancel: &CancelToken,
        build: &str,
        artifacts: Vec<Artifact>,
        build_err: Option<&(dyn Error + Send + Sync + 'static)>,
    ) -> BuildCompletion<RegistryError> {
        let component = match self.resolve(build) {
            Ok(component) => component,
            Err(e) => return BuildCompletion::failed(Vec::new(), e),
        };

        tracing::debug!(
            build,
            component = %component,
            artifacts = artifacts.len(),
            failed = build_err.is_some(),
            "Completing build"
        );
        self.bucket
            .complete_build(cancel, &component, artifacts, build_err)
            .map_err(|source| RegistryError::CompleteBuild {
                build: build.to_string(),
                source,
            })
    }
}
