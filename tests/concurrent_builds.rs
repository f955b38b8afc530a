//! Concurrent build runs through a registrar
//!
//! Builds execute on separate threads; each one is started and completed in
//! the shared bucket independently of the others.

use hcp_registrar::bucket::memory::{BucketCall, BuildStatus, FailureConfig, Operation};
use hcp_registrar::bucket::MemoryBucketFactory;
use hcp_registrar::cancel::EXIT_CODE_CANCELLED;
use hcp_registrar::{
    registry, run_builds, Artifact, BuildOutcome, CancelToken, Cancelled, JsonMetadataRegistry,
    MemoryBucket, MetadataRegistry, RegistryConfig,
};
use legacy_template::Template;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

const MANY_BUILDERS: &str = r#"{
    "builders": [
        {"type": "amazon-ebs", "name": "us-east"},
        {"type": "amazon-ebs", "name": "us-west"},
        {"type": "azure-arm"},
        {"type": "googlecompute"},
        {"type": "docker"},
        {"type": "null"}
    ]
}"#;

fn template() -> Template {
    Template::parse(MANY_BUILDERS, "/work/packer.json").unwrap()
}

fn populated(template: &Template) -> JsonMetadataRegistry<'_, Template, MemoryBucket> {
    let bucket = MemoryBucket::new("golden-images").with_fingerprint("4f9c2a1");
    let mut registry = JsonMetadataRegistry::with_bucket(template, bucket).unwrap();
    registry.populate_iteration(&CancelToken::new()).unwrap();
    registry
}

fn all(template: &Template) -> Vec<String> {
    template.all_build_names()
}

#[test]
fn test_all_builds_complete_concurrently() {
    let template = template();
    let registry = populated(&template);
    let executed = AtomicUsize::new(0);

    let summary = run_builds(&registry, &CancelToken::new(), &all(&template), |build, _| {
        executed.fetch_add(1, Ordering::SeqCst);
        Ok(vec![Artifact::new("packer.test", format!("{}-image", build))])
    });

    assert!(summary.is_success(), "{}", summary.human_summary);
    assert_eq!(executed.load(Ordering::SeqCst), 6);
    assert_eq!(summary.succeeded, 6);
    for record in registry.bucket().snapshot().builds {
        assert_eq!(record.status, BuildStatus::Done, "{}", record.component);
        assert_eq!(record.artifacts.len(), 1);
    }

    // Reports keep the requested order.
    let order: Vec<_> = summary.builds.iter().map(|b| b.build.as_str()).collect();
    assert_eq!(order, vec!["us-east", "us-west", "azure-arm", "googlecompute", "docker", "null"]);
}

#[test]
fn test_one_failure_does_not_affect_others() {
    let template = template();
    let registry = populated(&template);

    let summary = run_builds(&registry, &CancelToken::new(), &all(&template), |build, _| {
        if build == "docker" {
            Err("docker daemon not running".into())
        } else {
            Ok(Vec::new())
        }
    });

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.succeeded, 5);
    assert_eq!(registry.bucket().status("docker"), Some(BuildStatus::Failed));
    assert_eq!(
        registry.bucket().status("amazon-ebs.us-west"),
        Some(BuildStatus::Done)
    );

    let completes = registry
        .bucket()
        .calls()
        .into_iter()
        .filter(|c| matches!(c, BucketCall::CompleteBuild(_)))
        .count();
    assert_eq!(completes, 6, "completion is relayed for every executed build");
}

#[test]
fn test_already_done_build_is_skipped() {
    let template = template();
    let registry = populated(&template);
    registry.bucket().mark_done("azure-arm");
    let executed = AtomicUsize::new(0);

    let summary = run_builds(&registry, &CancelToken::new(), &all(&template), |_, _| {
        executed.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    });

    assert!(summary.is_success());
    assert_eq!(summary.skipped, 1);
    assert_eq!(executed.load(Ordering::SeqCst), 5);
    assert_eq!(
        summary.report("azure-arm").unwrap().outcome,
        BuildOutcome::Skipped
    );
}

#[test]
fn test_start_failure_skips_execution() {
    let template = template();
    let registry = populated(&template);
    registry.bucket().inject_failure(
        Operation::StartBuild,
        FailureConfig::error("500 Internal Server Error").for_component("googlecompute"),
    );
    let executed = AtomicUsize::new(0);

    let summary = run_builds(&registry, &CancelToken::new(), &all(&template), |_, _| {
        executed.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    });

    assert_eq!(executed.load(Ordering::SeqCst), 5);
    let report = summary.report("googlecompute").unwrap();
    assert_eq!(report.outcome, BuildOutcome::Failed);
    assert!(report.error.as_deref().unwrap().contains("googlecompute"));
    assert!(!registry
        .bucket()
        .calls()
        .contains(&BucketCall::CompleteBuild("googlecompute".into())));
}

#[test]
fn test_cancelled_build_recorded_as_cancelled() {
    let template = template();
    let registry = populated(&template);
    let cancel = CancelToken::new();

    let summary = run_builds(&registry, &cancel, &["null".to_string()], |_, _| {
        Err(Cancelled.into())
    });

    assert_eq!(summary.cancelled, 1);
    assert_eq!(registry.bucket().status("null"), Some(BuildStatus::Cancelled));
}

#[test]
fn test_selected_subset_runs_but_all_registered() {
    let template = template();
    let registry = populated(&template);

    let summary = run_builds(&registry, &CancelToken::new(), &["docker".to_string()], |_, _| {
        Ok(Vec::new())
    });

    assert_eq!(summary.build_count, 1);
    assert_eq!(registry.bucket().components().len(), 6);
    assert_eq!(registry.bucket().status("null"), Some(BuildStatus::Unset));
}

#[test]
fn test_boxed_registry_from_config() {
    let template = template();
    let config = RegistryConfig {
        bucket_name: Some("golden-images".into()),
        fingerprint: Some("4f9c2a1".into()),
        ..RegistryConfig::default()
    };
    let factory = MemoryBucketFactory::new(config.clone());
    let cancel = CancelToken::new();

    let mut boxed = registry::new(&template, &factory, &config).unwrap();
    boxed.populate_iteration(&cancel).unwrap();

    let summary = run_builds(&*boxed, &cancel, &all(&template), |_, _| Ok(Vec::new()));
    assert!(summary.is_success());
}

#[test]
fn test_duplicate_build_names_never_overlap() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("packer.json");
    fs::write(&path, r#"{"builders": [{"type": "null"}, {"type": "null"}]}"#).unwrap();

    let template = Template::from_file(&path).unwrap();
    assert_eq!(template.source_dir(), dir.path());
    let builds = all(&template);
    assert_eq!(builds, vec!["null", "null"]);

    let registry = populated(&template);
    let in_flight = AtomicUsize::new(0);
    let max_in_flight = AtomicUsize::new(0);
    let executed = AtomicUsize::new(0);

    let summary = run_builds(&registry, &CancelToken::new(), &builds, |_, _| {
        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        max_in_flight.fetch_max(now, Ordering::SeqCst);
        executed.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(Vec::new())
    });

    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(executed.load(Ordering::SeqCst), 1);
    let outcomes: Vec<_> = summary.builds.iter().map(|b| b.outcome).collect();
    assert_eq!(outcomes, vec![BuildOutcome::Succeeded, BuildOutcome::Skipped]);
    assert!(summary.is_success(), "{}", summary.human_summary);

    // Both entries reach the bucket, one after the other; the second is refused.
    let starts = registry
        .bucket()
        .calls()
        .into_iter()
        .filter(|call| matches!(call, BucketCall::StartBuild(name) if name == "null"))
        .count();
    assert_eq!(starts, 2);
    assert_eq!(registry.bucket().components(), vec!["null".to_string()]);
    assert_eq!(registry.bucket().status("null"), Some(BuildStatus::Done));
}

#[test]
fn test_cancelled_while_publishing_is_cancelled() {
    let template = template();
    let registry = populated(&template);
    let cancel = CancelToken::new();

    let summary = run_builds(&registry, &cancel, &["null".to_string()], |build, cancel| {
        cancel.cancel();
        Ok(vec![Artifact::new("null", build)])
    });

    assert_eq!(summary.builds[0].outcome, BuildOutcome::Cancelled);
    assert_eq!(summary.exit_code, EXIT_CODE_CANCELLED);
    assert_eq!(registry.bucket().status("null"), Some(BuildStatus::Cancelled));
}
