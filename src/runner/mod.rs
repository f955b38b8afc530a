//! Build runner
//!
//! Drives selected builds concurrently through a [`MetadataRegistry`]:
//! start → execute → complete. Completion is always relayed for a build
//! that executed, including failed ones, so the registry can record the
//! failure instead of publishing.

mod summary;

pub use summary::{
    BuildOutcome, BuildReport, RunSummary, EXIT_CODE_FAILED, EXIT_CODE_SUCCESS,
};

use std::thread;
use std::time::Instant;

use crate::artifact::Artifact;
use crate::bucket::BuildError;
use crate::cancel::{is_cancellation, CancelToken};
use crate::registry::MetadataRegistry;

/// Run `builds` concurrently, one thread per distinct build name.
///
/// A name listed more than once runs its entries one after another on the
/// same thread, so the registry never sees overlapping start/complete calls
/// for one name. Reports keep the order of `builds`.
///
/// `execute` performs the build itself and returns its artifacts.
pub fn run_builds<R, E>(
    registry: &R,
    cancel: &CancelToken,
    builds: &[String],
    execute: E,
) -> RunSummary
where
    R: MetadataRegistry + ?Sized,
    E: Fn(&str, &CancelToken) -> Result<Vec<Artifact>, BuildError> + Sync,
{
    let started = Instant::now();
    let execute = &execute;

    let mut reports: Vec<(usize, BuildReport)> = thread::scope(|scope| {
        let handles: Vec<_> = group_by_name(builds)
            .into_iter()
            .map(|(build, slots)| {
                let queue = slots.clone();
                let handle = scope.spawn(move || {
                    queue
                        .iter()
                        .map(|&slot| (slot, run_one(registry, cancel, build, execute)))
                        .collect::<Vec<_>>()
                });
                (build, slots, handle)
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|(build, slots, handle)| {
                handle.join().unwrap_or_else(|_| {
                    slots.iter().map(|&slot| (slot, panicked(build))).collect()
                })
            })
            .collect()
    });
    reports.sort_by_key(|(slot, _)| *slot);

    let reports = reports.into_iter().map(|(_, report)| report).collect();
    let summary = RunSummary::from_reports(reports, elapsed_ms(started));
    tracing::info!(exit_code = summary.exit_code, "{}", summary.human_summary);
    summary
}

/// Distinct names in first-seen order, each with the positions it occupies.
fn group_by_name(builds: &[String]) -> Vec<(&str, Vec<usize>)> {
    let mut groups: Vec<(&str, Vec<usize>)> = Vec::new();
    for (slot, build) in builds.iter().enumerate() {
        match groups.iter_mut().find(|(name, _)| *name == build.as_str()) {
            Some((_, slots)) => slots.push(slot),
            None => groups.push((build.as_str(), vec![slot])),
        }
    }
    groups
}

fn panicked(build: &str) -> BuildReport {
    BuildReport {
        build: build.to_string(),
        outcome: BuildOutcome::Failed,
        artifacts: Vec::new(),
        error: Some("build panicked".to_string()),
        duration_ms: 0,
    }
}

fn run_one<R, E>(registry: &R, cancel: &CancelToken, build: &str, execute: &E) -> BuildReport
where
    R: MetadataRegistry + ?Sized,
    E: Fn(&str, &CancelToken) -> Result<Vec<Artifact>, BuildError>,
{
    let started = Instant::now();
    let report = |outcome, artifacts, error: Option<String>| BuildReport {
        build: build.to_string(),
        outcome,
        artifacts,
        error,
        duration_ms: elapsed_ms(started),
    };

    if cancel.is_cancelled() {
        return report(BuildOutcome::Cancelled, Vec::new(), Some("run cancelled".into()));
    }

    if let Err(e) = registry.start_build(cancel, build) {
        if e.is_already_done() {
            tracing::info!(build, "Build already done in this iteration, skipping");
            return report(BuildOutcome::Skipped, Vec::new(), Some(e.to_string()));
        }
        if is_cancellation(&e) {
            tracing::warn!(build, "Build cancelled before it started");
            return report(BuildOutcome::Cancelled, Vec::new(), Some(e.to_string()));
        }
        tracing::error!(build, error = %e, "Could not start build");
        return report(BuildOutcome::Failed, Vec::new(), Some(e.to_string()));
    }

    match execute(build, cancel) {
        Ok(artifacts) => {
            let completion = registry.complete_build(cancel, build, artifacts, None);
            match completion.error {
                None => report(BuildOutcome::Succeeded, completion.artifacts, None),
                Some(e) if is_cancellation(&e) => {
                    tracing::warn!(build, "Build cancelled while publishing artifacts");
                    report(BuildOutcome::Cancelled, completion.artifacts, Some(e.to_string()))
                }
                Some(e) => {
                    tracing::error!(build, error = %e, "Could not complete build");
                    report(BuildOutcome::Failed, completion.artifacts, Some(e.to_string()))
                }
            }
        }
        Err(build_err) => {
            let completion = registry.complete_build(cancel, build, Vec::new(), Some(&*build_err));
            if let Some(e) = &completion.error {
                tracing::debug!(build, error = %e, "Registry recorded failed build");
            }
            let outcome = if is_cancellation(&*build_err) {
                BuildOutcome::Cancelled
            } else {
                BuildOutcome::Failed
            };
            report(outcome, completion.artifacts, Some(build_err.to_string()))
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
