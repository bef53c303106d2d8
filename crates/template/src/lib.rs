//! `template` crate — variable context and `{{scope.path}}` placeholder resolution.
//!
//! This is component A of the execution core: an immutable-after-construction
//! [`VariableContext`] holding the `workflow` / `execution` / `input` /
//! `resource` scopes, and a [`TemplateEngine`] that resolves placeholders
//! against it, recursively, across arbitrarily nested JSON.

pub mod context;
pub mod engine;
pub mod error;
pub mod path;

pub use context::VariableContext;
pub use engine::{TemplateEngine, TemplateOptions};
pub use error::TemplateError;
