//! In-memory bucket
//!
//! Implements the bucket contract without a registry connection. It backs the
//! `dry-run` command and the test suite:
//!
//! - records every call in arrival order ([`MemoryBucket::calls`])
//! - keeps per-build status the way the registry would
//! - supports failure injection per operation ([`FailureInjector`])

mod failure;
mod state;

pub use failure::{FailureConfig, FailureInjector, Operation};
pub use state::{BucketCall, BucketSnapshot, BuildRecord, BuildStatus, Iteration};

use chrono::Utc;
use regex_lite::Regex;
use std::collections::BTreeMap;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock};

use super::{Bucket, BucketError, BucketFactory, BuildCompletion};
use crate::artifact::Artifact;
use crate::cancel::{is_cancellation, CancelToken};
use crate::config::{RegistryConfig, ENV_BUILD_FINGERPRINT};
use crate::diagnostic::{Diagnostic, Diagnostics};

fn bucket_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9-]{3,36}$").expect("valid pattern"))
}

#[derive(Debug, Default)]
struct Inner {
    builds: BTreeMap<String, BuildRecord>,
    calls: Vec<BucketCall>,
    failures: FailureInjector,
}

/// Bucket kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryBucket {
    name: Option<String>,
    description: Option<String>,
    labels: BTreeMap<String, String>,
    build_labels: BTreeMap<String, String>,
    fingerprint: Option<String>,
    source_dir: PathBuf,
    components: Vec<String>,
    iteration: Option<Iteration>,
    populated: bool,
    inner: Mutex<Inner>,
}

impl MemoryBucket {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Bucket configured from merged registry settings
    pub fn from_config(source_dir: &Path, config: &RegistryConfig) -> Self {
        Self {
            name: config.bucket_name.clone(),
            description: config.bucket_description.clone(),
            labels: config.bucket_labels.clone(),
            build_labels: config.build_labels.clone(),
            fingerprint: config.fingerprint.clone(),
            source_dir: source_dir.to_path_buf(),
            ..Self::default()
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    pub fn with_build_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.build_labels = labels;
        self
    }

    /// Make `op` fail with `config`
    pub fn inject_failure(&self, op: Operation, config: FailureConfig) {
        self.inner().failures.inject(op, config);
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Registered components in registration order
    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn iteration(&self) -> Option<&Iteration> {
        self.iteration.as_ref()
    }

    /// Every call received so far
    pub fn calls(&self) -> Vec<BucketCall> {
        self.inner().calls.clone()
    }

    pub fn build(&self, component: &str) -> Option<BuildRecord> {
        self.inner().builds.get(component).cloned()
    }

    pub fn status(&self, component: &str) -> Option<BuildStatus> {
        self.inner().builds.get(component).map(|b| b.status)
    }

    /// Mark a build done as if a previous run had completed it
    pub fn mark_done(&self, component: &str) {
        let mut inner = self.inner();
        let labels = self.build_labels.clone();
        inner
            .builds
            .entry(component.to_string())
            .or_insert_with(|| BuildRecord::new(component.to_string(), labels))
            .transition(BuildStatus::Done);
    }

    pub fn snapshot(&self) -> BucketSnapshot {
        let inner = self.inner();
        BucketSnapshot {
            name: self.name.clone(),
            description: self.description.clone(),
            labels: self.labels.clone(),
            iteration: self.iteration.clone(),
            components: self.components.clone(),
            builds: inner.builds.values().cloned().collect(),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn injected(inner: &mut Inner, op: Operation, component: Option<&str>) -> Result<(), BucketError> {
        match inner.failures.check(op, component) {
            Some(message) => Err(BucketError::Remote(message)),
            None => Ok(()),
        }
    }
}

impl Bucket for MemoryBucket {
    fn register_build_for_component(&mut self, component: &str) {
        let inner = self.inner.get_mut().unwrap_or_else(|e| e.into_inner());
        inner.calls.push(BucketCall::Register(component.to_string()));

        if !self.components.iter().any(|c| c == component) {
            tracing::debug!(component, "Registered build component");
            self.components.push(component.to_string());
        }
    }

    fn validate(&self) -> Result<(), BucketError> {
        let mut inner = self.inner();
        inner.calls.push(BucketCall::Validate);
        Self::injected(&mut inner, Operation::Validate, None)?;

        let name = self.name.as_deref().ok_or_else(|| {
            BucketError::InvalidConfig("bucket name is required; set HCP_PACKER_BUCKET_NAME".into())
        })?;
        if !bucket_name_pattern().is_match(name) {
            return Err(BucketError::InvalidConfig(format!(
                "bucket name {:?} must be 3-36 characters of letters, digits and dashes",
                name
            )));
        }
        if self.fingerprint.as_deref().map_or(true, str::is_empty) {
            return Err(BucketError::MissingFingerprint);
        }
        Ok(())
    }

    fn initialize(&mut self, cancel: &CancelToken) -> Result<(), BucketError> {
        let inner = self.inner.get_mut().unwrap_or_else(|e| e.into_inner());
        inner.calls.push(BucketCall::Initialize);
        cancel.check()?;
        Self::injected(inner, Operation::Initialize, None)?;

        if self.iteration.is_some() {
            return Ok(());
        }
        let fingerprint = self.fingerprint.clone().ok_or(BucketError::MissingFingerprint)?;
        let iteration = Iteration {
            id: uuid::Uuid::new_v4().to_string(),
            fingerprint,
            created_at: Utc::now(),
        };
        tracing::debug!(iteration = %iteration.id, "Created iteration");
        self.iteration = Some(iteration);
        Ok(())
    }

    fn populate_iteration(&mut self, cancel: &CancelToken) -> Result<(), BucketError> {
        let inner = self.inner.get_mut().unwrap_or_else(|e| e.into_inner());
        inner.calls.push(BucketCall::PopulateIteration);
        cancel.check()?;
        Self::injected(inner, Operation::PopulateIteration, None)?;

        if self.iteration.is_none() {
            return Err(BucketError::NotInitialized);
        }
        for component in &self.components {
            let labels = self.build_labels.clone();
            inner
                .builds
                .entry(component.clone())
                .or_insert_with(|| BuildRecord::new(component.clone(), labels));
        }
        self.populated = true;
        Ok(())
    }

    fn start_build(&self, cancel: &CancelToken, component: &str) -> Result<(), BucketError> {
        let mut inner = self.inner();
        inner.calls.push(BucketCall::StartBuild(component.to_string()));
        cancel.check()?;
        Self::injected(&mut inner, Operation::StartBuild, Some(component))?;

        if !self.populated {
            return Err(BucketError::NotPopulated);
        }
        let record = inner
            .builds
            .get_mut(component)
            .ok_or_else(|| BucketError::UnknownBuild(component.to_string()))?;
        if record.status == BuildStatus::Done {
            return Err(BucketError::BuildAlreadyDone(component.to_string()));
        }
        record.transition(BuildStatus::Running);
        Ok(())
    }

    fn complete_build(
        &self,
        cancel: &CancelToken,
        component: &str,
        artifacts: Vec<Artifact>,
        build_err: Option<&(dyn Error + Send + Sync + 'static)>,
    ) -> BuildCompletion<BucketError> {
        let mut inner = self.inner();
        inner.calls.push(BucketCall::CompleteBuild(component.to_string()));
        if let Err(e) = Self::injected(&mut inner, Operation::CompleteBuild, Some(component)) {
            return BuildCompletion::failed(artifacts, e);
        }

        let Some(record) = inner.builds.get_mut(component) else {
            return BuildCompletion::failed(artifacts, BucketError::UnknownBuild(component.to_string()));
        };

        if let Some(err) = build_err {
            let status = if is_cancellation(err) {
                BuildStatus::Cancelled
            } else {
                BuildStatus::Failed
            };
            tracing::warn!(component, error = %err, "Build failed, artifacts not published");
            record.transition(status);
            return BuildCompletion::failed(artifacts, BucketError::BuildFailed(component.to_string()));
        }

        if let Err(e) = cancel.check() {
            record.transition(BuildStatus::Cancelled);
            return BuildCompletion::failed(artifacts, e.into());
        }

        record.artifacts = artifacts.clone();
        record.transition(BuildStatus::Done);
        BuildCompletion::ok(artifacts)
    }
}

/// Creates [`MemoryBucket`]s from merged registry settings
#[derive(Debug, Clone, Default)]
pub struct MemoryBucketFactory {
    config: RegistryConfig,
}

impl MemoryBucketFactory {
    pub fn new(config: RegistryConfig) -> Self {
        Self { config }
    }
}

impl BucketFactory for MemoryBucketFactory {
    type Bucket = MemoryBucket;

    fn create(&self, source_dir: &Path) -> Result<MemoryBucket, Diagnostics> {
        if self.config.fingerprint.as_deref().map_or(true, str::is_empty) {
            return Err(Diagnostic::error(
                "Missing build fingerprint",
                format!(
                    "The iteration for templates in {} cannot be identified. \
                     Set {} to a value unique to this build, such as a commit SHA.",
                    source_dir.display(),
                    ENV_BUILD_FINGERPRINT
                ),
            )
            .into());
        }

        tracing::debug!(source_dir = %source_dir.display(), "Derived bucket");
        Ok(MemoryBucket::from_config(source_dir, &self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::Cancelled;

    fn ready_bucket(components: &[&str]) -> MemoryBucket {
        let mut bucket = MemoryBucket::new("golden-images").with_fingerprint("fp-1");
        for c in components {
            bucket.register_build_for_component(c);
        }
        let cancel = CancelToken::new();
        bucket.validate().unwrap();
        bucket.initialize(&cancel).unwrap();
        bucket.populate_iteration(&cancel).unwrap();
        bucket
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut bucket = MemoryBucket::new("golden-images");
        bucket.register_build_for_component("amazon-ebs");
        bucket.register_build_for_component("docker");
        bucket.register_build_for_component("amazon-ebs");

        assert_eq!(bucket.components(), &["amazon-ebs", "docker"]);
        assert_eq!(bucket.calls().len(), 3);
    }

    #[test]
    fn test_validate_requires_name() {
        let bucket = MemoryBucket::default().with_fingerprint("fp");
        assert!(matches!(bucket.validate(), Err(BucketError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_name_format() {
        let bucket = MemoryBucket::new("no spaces allowed").with_fingerprint("fp");
        assert!(matches!(bucket.validate(), Err(BucketError::InvalidConfig(_))));

        let bucket = MemoryBucket::new("ab").with_fingerprint("fp");
        assert!(bucket.validate().is_err());
    }

    #[test]
    fn test_validate_requires_fingerprint() {
        let bucket = MemoryBucket::new("golden-images");
        assert!(matches!(bucket.validate(), Err(BucketError::MissingFingerprint)));
    }

    #[test]
    fn test_initialize_once() {
        let mut bucket = MemoryBucket::new("golden-images").with_fingerprint("fp-1");
        let cancel = CancelToken::new();
        bucket.initialize(&cancel).unwrap();
        let first = bucket.iteration().unwrap().id.clone();

        bucket.initialize(&cancel).unwrap();
        assert_eq!(bucket.iteration().unwrap().id, first);
        assert_eq!(bucket.iteration().unwrap().fingerprint, "fp-1");
    }

    #[test]
    fn test_initialize_cancelled() {
        let mut bucket = MemoryBucket::new("golden-images").with_fingerprint("fp-1");
        let cancel = CancelToken::new();
        cancel.cancel();

        assert!(matches!(bucket.initialize(&cancel), Err(BucketError::Cancelled(_))));
        assert!(bucket.iteration().is_none());
    }

    #[test]
    fn test_populate_requires_initialize() {
        let mut bucket = MemoryBucket::new("golden-images").with_fingerprint("fp-1");
        let err = bucket.populate_iteration(&CancelToken::new()).unwrap_err();
        assert!(matches!(err, BucketError::NotInitialized));
    }

    #[test]
    fn test_populate_creates_records_with_labels() {
        let labels: BTreeMap<String, String> = [("os".to_string(), "linux".to_string())].into();
        let mut bucket = MemoryBucket::new("golden-images")
            .with_fingerprint("fp-1")
            .with_build_labels(labels);
        bucket.register_build_for_component("docker");
        let cancel = CancelToken::new();
        bucket.initialize(&cancel).unwrap();
        bucket.populate_iteration(&cancel).unwrap();

        let record = bucket.build("docker").unwrap();
        assert_eq!(record.status, BuildStatus::Unset);
        assert_eq!(record.labels["os"], "linux");
    }

    #[test]
    fn test_start_requires_population() {
        let bucket = MemoryBucket::new("golden-images").with_fingerprint("fp-1");
        let err = bucket.start_build(&CancelToken::new(), "docker").unwrap_err();
        assert!(matches!(err, BucketError::NotPopulated));
    }

    #[test]
    fn test_start_unknown_build() {
        let bucket = ready_bucket(&["docker"]);
        let err = bucket.start_build(&CancelToken::new(), "amazon-ebs").unwrap_err();
        assert!(matches!(err, BucketError::UnknownBuild(_)));
    }

    #[test]
    fn test_start_already_done() {
        let bucket = ready_bucket(&["docker"]);
        bucket.mark_done("docker");

        let err = bucket.start_build(&CancelToken::new(), "docker").unwrap_err();
        assert!(err.is_already_done());
    }

    #[test]
    fn test_complete_success_publishes() {
        let bucket = ready_bucket(&["docker"]);
        let cancel = CancelToken::new();
        bucket.start_build(&cancel, "docker").unwrap();

        let artifacts = vec![Artifact::new("packer.docker", "sha256:abc")];
        let completion = bucket.complete_build(&cancel, "docker", artifacts.clone(), None);

        assert!(completion.is_ok());
        assert_eq!(completion.artifacts, artifacts);
        let record = bucket.build("docker").unwrap();
        assert_eq!(record.status, BuildStatus::Done);
        assert_eq!(record.artifacts, artifacts);
    }

    #[test]
    fn test_complete_failure_suppresses_publish() {
        let bucket = ready_bucket(&["docker"]);
        let cancel = CancelToken::new();
        bucket.start_build(&cancel, "docker").unwrap();

        let build_err = std::io::Error::new(std::io::ErrorKind::Other, "provisioner failed");
        let artifacts = vec![Artifact::new("packer.docker", "sha256:abc")];
        let completion = bucket.complete_build(&cancel, "docker", artifacts.clone(), Some(&build_err));

        assert_eq!(completion.artifacts, artifacts);
        assert!(matches!(completion.error, Some(BucketError::BuildFailed(_))));
        let record = bucket.build("docker").unwrap();
        assert_eq!(record.status, BuildStatus::Failed);
        assert!(record.artifacts.is_empty());
    }

    #[test]
    fn test_complete_cancelled_build() {
        let bucket = ready_bucket(&["docker"]);
        let cancel = CancelToken::new();
        bucket.start_build(&cancel, "docker").unwrap();

        let completion = bucket.complete_build(&cancel, "docker", Vec::new(), Some(&Cancelled));
        assert!(!completion.is_ok());
        assert_eq!(bucket.status("docker"), Some(BuildStatus::Cancelled));
    }

    #[test]
    fn test_injected_start_failure() {
        let bucket = ready_bucket(&["docker", "amazon-ebs"]);
        bucket.inject_failure(
            Operation::StartBuild,
            FailureConfig::error("503 Service Unavailable").for_component("docker"),
        );
        let cancel = CancelToken::new();

        assert!(matches!(
            bucket.start_build(&cancel, "docker"),
            Err(BucketError::Remote(_))
        ));
        assert!(bucket.start_build(&cancel, "amazon-ebs").is_ok());
    }

    #[test]
    fn test_call_log_order() {
        let bucket = ready_bucket(&["docker"]);
        assert_eq!(
            bucket.calls(),
            vec![
                BucketCall::Register("docker".into()),
                BucketCall::Validate,
                BucketCall::Initialize,
                BucketCall::PopulateIteration,
            ]
        );
    }

    #[test]
    fn test_snapshot() {
        let bucket = ready_bucket(&["docker", "amazon-ebs"]);
        let snapshot = bucket.snapshot();

        assert_eq!(snapshot.name.as_deref(), Some("golden-images"));
        assert_eq!(snapshot.components, vec!["docker", "amazon-ebs"]);
        assert_eq!(snapshot.builds.len(), 2);
        assert!(snapshot.iteration.is_some());
    }

    #[test]
    fn test_factory_requires_fingerprint() {
        let factory = MemoryBucketFactory::new(RegistryConfig {
            bucket_name: Some("golden-images".into()),
            ..RegistryConfig::default()
        });

        let diags = factory.create(Path::new("/work")).unwrap_err();
        assert!(diags.has_errors());
        assert!(diags.to_string().contains(ENV_BUILD_FINGERPRINT));
    }

    #[test]
    fn test_factory_applies_config() {
        let factory = MemoryBucketFactory::new(RegistryConfig {
            bucket_name: Some("golden-images".into()),
            fingerprint: Some("fp-9".into()),
            ..RegistryConfig::default()
        });

        let bucket = factory.create(Path::new("/work")).unwrap();
        assert_eq!(bucket.source_dir(), Path::new("/work"));
        assert!(bucket.validate().is_ok());
    }
}
