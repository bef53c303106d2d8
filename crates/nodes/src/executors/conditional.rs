//! Conditional executor: evaluates a boolean expression over `{input:
//! <input>}`. The scheduler reads the boolean output and prunes the
//! non-matching `true`/`false` outgoing edge — this executor only produces
//! the boolean.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ConfigExt;
use crate::error::NodeError;
use crate::traits::{ExecutionContext, Executor};

#[derive(Default)]
pub struct ConditionalExecutor;

#[async_trait]
impl Executor for ConditionalExecutor {
    async fn execute(
        &self,
        _ctx: &ExecutionContext,
        config: &Value,
        input: &Value,
    ) -> Result<Value, NodeError> {
        let expr = config.require_str("expression")?;
        let (rewritten, context) = super::transform::rewrite_input_paths(&expr, input)?;
        let result = evalexpr::eval_boolean_with_context(&rewritten, &context)
            .map_err(|e| NodeError::Fatal(format!("conditional expression error: {e}")))?;
        Ok(Value::Bool(result))
    }

    fn validate(&self, config: &Value) -> Result<(), NodeError> {
        config.require_str("expression")?;
        Ok(())
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
    async fn score_above_threshold_is_true() {
        let exec = ConditionalExecutor;
        let out = exec
            .execute(
                &ctx(),
                &json!({"expression": "input.score >= 80"}),
                &json!({"score": 85}),
            )
            .await
            .unwrap();
        assert_eq!(out, json!(true));
    }

    #[tokio::test]
    async fn score_below_threshold_is_false() {
        let exec = ConditionalExecutor;
        let out = exec
            .execute(
                &ctx(),
                &json!({"expression": "input.score >= 80"}),
                &json!({"score": 40}),
            )
            .await
            .unwrap();
        assert_eq!(out, json!(false));
    }
}
