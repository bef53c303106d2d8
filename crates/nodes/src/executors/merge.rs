//! Merge (fan-in) executor: collection is the scheduler's job (§4.F); this
//! executor just returns whatever aggregated input the scheduler assembled.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ConfigExt;
use crate::error::NodeError;
use crate::traits::{ExecutionContext, Executor};

/// `all` waits for every inbound edge; `any` fires on the first arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    All,
    Any,
}

impl MergeStrategy {
    pub fn from_config(config: &Value) -> Self {
        match config.get_str("merge_strategy", "all").as_str() {
            "any" => MergeStrategy::Any,
            _ => MergeStrategy::All,
        }
    }
}

#[derive(Default)]
pub struct MergeExecutor;

#[async_trait]
impl Executor for MergeExecutor {
    async fn execute(
        &self,
        _ctx: &ExecutionContext,
        _config: &Value,
        input: &Value,
    ) -> Result<Value, NodeError> {
        Ok(input.clone())
    }

    fn validate(&self, config: &Value) -> Result<(), NodeError> {
        match config.get_str("merge_strategy", "all").as_str() {
            "all" | "any" => Ok(()),
            other => Err(NodeError::Fatal(format!("unknown merge_strategy '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> ExecutionContext {
        ExecutionContext {
            workflow_id: uuid::Uuid::new_v4(),
            execution_id: uuid::Uuid::new_v4(),
            node_id: "n1".into(),
            cancellation: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn merge_returns_collected_input_as_is() {
        let exec = MergeExecutor;
        let input = json!({"a": {"x": 1}, "b": {"y": 2}});
        let out = exec
            .execute(&ctx(), &json!({"merge_strategy": "all"}), &input)
            .await
            .unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn strategy_parses_from_config() {
        assert_eq!(
            MergeStrategy::from_config(&json!({"merge_strategy": "any"})),
            MergeStrategy::Any
        );
        assert_eq!(
            MergeStrategy::from_config(&json!({})),
            MergeStrategy::All
        );
    }
}
