//! In-memory bucket state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::artifact::Artifact;

/// Registry-side status of one build in the iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStatus {
    /// Entry created, build not started
    Unset,
    Running,
    /// Artifacts published
    Done,
    Failed,
    Cancelled,
}

/// One build entry in the iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRecord {
    /// Canonical component name
    pub component: String,
    pub status: BuildStatus,
    pub labels: BTreeMap<String, String>,
    /// Published artifacts (empty unless `Done`)
    pub artifacts: Vec<Artifact>,
    pub status_history: Vec<(BuildStatus, DateTime<Utc>)>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BuildRecord {
    pub fn new(component: String, labels: BTreeMap<String, String>) -> Self {
        let now = Utc::now();
        Self {
            component,
            status: BuildStatus::Unset,
            labels,
            artifacts: Vec::new(),
            status_history: vec![(BuildStatus::Unset, now)],
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition(&mut self, status: BuildStatus) {
        let now = Utc::now();
        self.status = status;
        self.status_history.push((status, now));
        self.updated_at = now;
    }
}

/// Iteration created by `initialize`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Iteration {
    pub id: String,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

/// Call recorded by the in-memory bucket, in arrival order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "component", rename_all = "snake_case")]
pub enum BucketCall {
    Register(String),
    Validate,
    Initialize,
    PopulateIteration,
    StartBuild(String),
    CompleteBuild(String),
}

/// Serializable view of the bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration: Option<Iteration>,
    /// Registered components in registration order
    pub components: Vec<String>,
    pub builds: Vec<BuildRecord>,
}
