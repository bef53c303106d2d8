//! Typed error type for the `template` crate.

use thiserror::Error;

/// Errors produced while resolving `{{scope.path}}` placeholders.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// Strict mode: a placeholder had no value in any applicable scope.
    #[error("missing template variable: {{{{{0}}}}}")]
    MissingPlaceholder(String),

    /// The text inside `{{ }}` did not parse as a valid scope/path expression.
    #[error("invalid template path: {0}")]
    InvalidPath(String),

    /// The path's leading segment wasn't one of `env`, `input`, `resource`.
    #[error("unknown template scope: {0}")]
    UnknownScope(String),
}
