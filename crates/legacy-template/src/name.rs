//! Registry naming rules.

use regex_lite::Regex;
use std::sync::OnceLock;

/// Errors deriving a registry-compatible build name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("no build named {0:?} in template")]
    UnknownBuild(String),

    #[error("build {build:?} has segment {segment:?} which is not registry-compatible")]
    Incompatible { build: String, segment: String },
}

fn segment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("valid pattern"))
}

/// Whether `segment` may appear in a registry build name.
pub fn is_compatible_segment(segment: &str) -> bool {
    segment_pattern().is_match(segment)
}
