//! Node-level error type.

use thiserror::Error;

/// Errors returned by an executor's `execute` method.
///
/// The dispatcher uses the variant to decide retry behaviour
/// ([`NodeError::is_retry_eligible`]):
/// - `Retryable` / `Timeout` — the node is re-tried with exponential back-off
///   (up to the node's configured retry budget).
/// - `Fatal` / `ExecutorNotFound` / `Template` / `Canceled` — no retry; the
///   node (and by default the execution) fails immediately.
#[derive(Debug, Error, Clone)]
pub enum NodeError {
    /// Transient failure; the dispatcher should retry.
    #[error("retryable node error: {0}")]
    Retryable(String),

    /// Permanent failure; no retry should be attempted.
    #[error("fatal node error: {0}")]
    Fatal(String),

    /// The node's `node_type` has no registered executor.
    #[error("no executor registered for node type '{0}'")]
    ExecutorNotFound(String),

    /// Strict-mode placeholder miss, or a malformed template path.
    #[error("template error: {0}")]
    Template(#[from] template::TemplateError),

    /// A per-node or per-tool deadline elapsed.
    #[error("node execution timed out")]
    Timeout,

    /// The execution (or an ancestor scope) was canceled.
    #[error("node execution canceled")]
    Canceled,
}

impl NodeError {
    /// Whether the dispatcher's retry policy should attempt another attempt
    /// for this error. Authoring errors (bad config, unknown executor,
    /// malformed templates) and cancellation are never retried.
    pub fn is_retry_eligible(&self) -> bool {
        matches!(self, NodeError::Retryable(_) | NodeError::Timeout)
    }
}
