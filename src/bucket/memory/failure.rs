//! Failure injection for the in-memory bucket

use std::collections::HashMap;

/// Bucket operation that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Validate,
    Initialize,
    PopulateIteration,
    StartBuild,
    CompleteBuild,
}

/// Failure configuration for an operation
#[derive(Debug, Clone)]
pub struct FailureConfig {
    /// Message carried by the injected registry error
    pub message: String,
    /// Only fail calls for this component (start/complete); `None` = any
    pub component: Option<String>,
    /// Number of times to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            component: None,
            fail_count: None,
        }
    }

    /// Restrict the failure to one component
    pub fn for_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }
}

/// Per-operation failure injector
#[derive(Debug, Default)]
pub struct FailureInjector {
    configs: HashMap<Operation, FailureConfig>,
    call_counts: HashMap<Operation, u32>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&mut self, op: Operation, config: FailureConfig) {
        self.configs.insert(op, config);
        self.call_counts.insert(op, 0);
    }

    /// Message to fail with, if `op` on `component` should fail now
    pub fn check(&mut self, op: Operation, component: Option<&str>) -> Option<String> {
        let config = self.configs.get(&op)?;
        if let Some(target) = &config.component {
            if component != Some(target.as_str()) {
                return None;
            }
        }

        let count = self.call_counts.entry(op).or_insert(0);
        *count += 1;
        match config.fail_count {
            Some(limit) if *count > limit => None,
            _ => Some(config.message.clone()),
        }
    }
}
