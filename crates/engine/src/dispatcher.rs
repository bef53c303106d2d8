//! Node executor dispatcher (component E).
//!
//! Given a single node and the input the scheduler collected for it, builds
//! the per-node [`template::VariableContext`], looks the executor up in the
//! registry, wraps it with the template wrapper, applies the per-node
//! timeout, and retries retry-eligible failures with exponential back-off.
//! Always returns a terminal [`NodeExecution`] — never propagates a node's
//! own failure as an `Err`, since a failed node is data the scheduler
//! reasons about, not an engine-level fault.

use chrono::Utc;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use nodes::{ExecutionContext, ExecutorRegistry, NodeError};
use template::{TemplateEngine, TemplateOptions, VariableContext};

use crate::models::{NodeExecution, NodeSpec, NodeStatus};

/// Tuning knobs shared by every dispatch on this scheduler run.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Applied when a node carries no `timeout_ms` override.
    pub default_timeout: Duration,
    pub template_options: TemplateOptions,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            template_options: TemplateOptions::default(),
        }
    }
}

pub struct NodeDispatcher {
    registry: ExecutorRegistry,
    config: DispatcherConfig,
}

impl NodeDispatcher {
    pub fn new(registry: ExecutorRegistry, config: DispatcherConfig) -> Self {
        Self { registry, config }
    }

    /// Run `node` to completion (success, failure, timeout, or cancellation),
    /// applying its retry policy along the way.
    pub async fn dispatch(
        &self,
        node: &NodeSpec,
        var_ctx: &VariableContext,
        input: Value,
        workflow_id: Uuid,
        execution_id: Uuid,
        cancellation: CancellationToken,
    ) -> NodeExecution {
        let mut record = NodeExecution::pending(node, input.clone());
        record.status = NodeStatus::Running;
        record.started_at = Some(Utc::now());

        let executor = match self.registry.get(&node.node_type) {
            Ok(e) => e,
            Err(e) => return finish_failed(record, e),
        };

        let node_var_ctx = var_ctx.with_input(input.clone());
        let wrapped = nodes::wrap(
            executor,
            Some(TemplateEngine::new(self.config.template_options)),
            node_var_ctx,
        );

        let timeout = node
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.config.default_timeout);
        let max_attempts = node.retry.as_ref().map(|r| r.max_attempts.max(1)).unwrap_or(1);
        let base_delay = node.retry.as_ref().map(|r| r.base_delay()).unwrap_or(Duration::ZERO);

        let exec_ctx = ExecutionContext {
            workflow_id,
            execution_id,
            node_id: node.id.clone(),
            cancellation: cancellation.clone(),
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            if cancellation.is_cancelled() {
                return finish_failed(record, NodeError::Canceled);
            }

            let outcome = tokio::select! {
                biased;
                _ = cancellation.cancelled() => Err(NodeError::Canceled),
                res = tokio::time::timeout(timeout, wrapped.execute(&exec_ctx, &node.config, &input)) => {
                    res.unwrap_or(Err(NodeError::Timeout))
                }
            };

            match outcome {
                Ok(output) => {
                    record.status = NodeStatus::Succeeded;
                    record.output = Some(output);
                    record.finished_at = Some(Utc::now());
                    return record;
                }
                Err(err) => {
                    if err.is_retry_eligible() && attempt < max_attempts {
                        let delay = base_delay.saturating_mul(1u32 << (attempt - 1).min(10));
                        warn!(
                            node_id = %node.id,
                            attempt,
                            max_attempts,
                            ?delay,
                            "node dispatch failed, retrying: {err}"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return finish_failed(record, err);
                }
            }
        }
    }
}

fn finish_failed(mut record: NodeExecution, err: NodeError) -> NodeExecution {
    record.status = NodeStatus::Failed;
    record.error = err.to_string();
    record.finished_at = Some(Utc::now());
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodes::mock::MockExecutor;
    use serde_json::json;

    fn registry_with(node_type: &str, executor: std::sync::Arc<dyn nodes::Executor>) -> ExecutorRegistry {
        let registry = ExecutorRegistry::new();
        registry.register(node_type, executor).unwrap();
        registry
    }

    fn var_ctx() -> VariableContext {
        VariableContext::default()
    }

    #[tokio::test]
    async fn successful_dispatch_produces_succeeded_record() {
        let registry = registry_with("mock", std::sync::Arc::new(MockExecutor::returning("m", json!("ok"))));
        let dispatcher = NodeDispatcher::new(registry, DispatcherConfig::default());
        let node = NodeSpec::new("n1", "mock", json!({}));
        let record = dispatcher
            .dispatch(&node, &var_ctx(), json!({}), Uuid::new_v4(), Uuid::new_v4(), CancellationToken::new())
            .await;
        assert_eq!(record.status, NodeStatus::Succeeded);
        assert_eq!(record.output, Some(json!("ok")));
    }

    #[tokio::test]
    async fn unregistered_node_type_fails_without_retry() {
        let registry = ExecutorRegistry::new();
        let dispatcher = NodeDispatcher::new(registry, DispatcherConfig::default());
        let node = NodeSpec::new("n1", "ghost", json!({}));
        let record = dispatcher
            .dispatch(&node, &var_ctx(), json!({}), Uuid::new_v4(), Uuid::new_v4(), CancellationToken::new())
            .await;
        assert_eq!(record.status, NodeStatus::Failed);
        assert!(record.error.contains("ghost"));
    }

    #[tokio::test]
    async fn retryable_failure_retries_until_budget_exhausted() {
        let registry = registry_with(
            "mock",
            std::sync::Arc::new(MockExecutor::failing_retryable("m", "upstream down")),
        );
        let dispatcher = NodeDispatcher::new(registry, DispatcherConfig::default());
        let mut node = NodeSpec::new("n1", "mock", json!({}));
        node.retry = Some(crate::models::RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
        });
        let record = dispatcher
            .dispatch(&node, &var_ctx(), json!({}), Uuid::new_v4(), Uuid::new_v4(), CancellationToken::new())
            .await;
        assert_eq!(record.status, NodeStatus::Failed);
        assert!(record.error.contains("upstream down"));
    }

    #[tokio::test]
    async fn already_canceled_token_short_circuits() {
        let registry = registry_with("mock", std::sync::Arc::new(MockExecutor::returning("m", json!("ok"))));
        let dispatcher = NodeDispatcher::new(registry, DispatcherConfig::default());
        let node = NodeSpec::new("n1", "mock", json!({}));
        let token = CancellationToken::new();
        token.cancel();
        let record = dispatcher
            .dispatch(&node, &var_ctx(), json!({}), Uuid::new_v4(), Uuid::new_v4(), token)
            .await;
        assert_eq!(record.status, NodeStatus::Failed);
        assert!(matches!(record.error.as_str(), s if s.contains("canceled")));
    }
}
