//! Legacy JSON build templates.
//!
//! Parses the builder section of a legacy JSON template, selects builds with
//! `only`/`except` glob filters, and derives registry-compatible names for
//! each declared build.

mod name;
mod select;
mod template;

pub use name::{is_compatible_segment, NameError};
pub use select::{BuildSelector, SelectError};
pub use template::{Builder, Template, TemplateError};
