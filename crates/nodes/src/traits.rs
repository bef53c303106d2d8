//! The `Executor` trait — the uniform contract every node type must fulfil.

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::NodeError;

/// Shared, cancellation-capable context passed to every executor invocation.
///
/// Defined here (in the `nodes` crate) so both `engine` and individual
/// executor implementations can import it without a circular dependency.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// ID of the parent workflow.
    pub workflow_id: uuid::Uuid,
    /// ID of the current execution run.
    pub execution_id: uuid::Uuid,
    /// ID of the node currently being dispatched.
    pub node_id: String,
    /// Cancelled by the scheduler on external cancellation, or by the
    /// dispatcher when a per-node timeout elapses. Executors performing I/O
    /// must observe this at their next checkpoint.
    pub cancellation: CancellationToken,
}

impl ExecutionContext {
    pub fn is_canceled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// The core executor contract (component B of the execution core).
///
/// Every built-in and user-registered node type implements this. A single
/// shared instance is held by the registry and invoked concurrently across
/// node dispatches — implementations must be safe for concurrent use, either
/// by being stateless or by encapsulating their own internal concurrency
/// (connection pools, provider clients, etc.).
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run the node. `config` has already been template-resolved by the
    /// wrapper before this is called; `input` is the collected input for
    /// this dispatch (parent output, or a merge's aggregated map).
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        config: &Value,
        input: &Value,
    ) -> Result<Value, NodeError>;

    /// Pure, I/O-free validation of `config`, called at authoring/registration
    /// time — never at execute time (templates aren't resolved yet here).
    fn validate(&self, config: &Value) -> Result<(), NodeError>;
}
