//! Run summary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::cancel::EXIT_CODE_CANCELLED;

/// Exit code when every build succeeded or was skipped
pub const EXIT_CODE_SUCCESS: i32 = 0;

/// Exit code when at least one build failed
pub const EXIT_CODE_FAILED: i32 = 1;

/// Final outcome of one build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildOutcome {
    Succeeded,
    Failed,
    Cancelled,
    /// Not executed, e.g. already done in this iteration
    Skipped,
}

/// Report for one build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub build: String,
    pub outcome: BuildOutcome,
    /// Artifacts handed back by the registry
    pub artifacts: Vec<Artifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Aggregated result of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub created_at: DateTime<Utc>,
    pub exit_code: i32,
    pub build_count: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub skipped: usize,
    pub builds: Vec<BuildReport>,
    pub duration_ms: u64,
    pub human_summary: String,
}

impl RunSummary {
    pub fn from_reports(builds: Vec<BuildReport>, duration_ms: u64) -> Self {
        let count = |outcome: BuildOutcome| builds.iter().filter(|b| b.outcome == outcome).count();
        let succeeded = count(BuildOutcome::Succeeded);
        let failed = count(BuildOutcome::Failed);
        let cancelled = count(BuildOutcome::Cancelled);
        let skipped = count(BuildOutcome::Skipped);

        let exit_code = if cancelled > 0 {
            EXIT_CODE_CANCELLED
        } else if failed > 0 {
            EXIT_CODE_FAILED
        } else {
            EXIT_CODE_SUCCESS
        };

        let human_summary =
            Self::generate_human_summary(builds.len(), succeeded, failed, cancelled, skipped);

        Self {
            created_at: Utc::now(),
            exit_code,
            build_count: builds.len(),
            succeeded,
            failed,
            cancelled,
            skipped,
            builds,
            duration_ms,
            human_summary,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == EXIT_CODE_SUCCESS
    }

    /// Report for `build`, if it was part of the run
    pub fn report(&self, build: &str) -> Option<&BuildReport> {
        self.builds.iter().find(|b| b.build == build)
    }

    fn generate_human_summary(
        total: usize,
        succeeded: usize,
        failed: usize,
        cancelled: usize,
        skipped: usize,
    ) -> String {
        if total == 0 {
            return "No builds to run".to_string();
        }

        let mut parts = Vec::new();
        if succeeded > 0 {
            parts.push(format!("{} succeeded", succeeded));
        }
        if failed > 0 {
            parts.push(format!("{} failed", failed));
        }
        if cancelled > 0 {
            parts.push(format!("{} cancelled", cancelled));
        }
        if skipped > 0 {
            parts.push(format!("{} skipped", skipped));
        }

        let noun = if total == 1 { "build" } else { "builds" };
        format!("{} {}: {}", total, noun, parts.join(", "))
    }
}
