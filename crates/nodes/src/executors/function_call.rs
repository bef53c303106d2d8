//! Function-call executor: looks up a named function in the builtin
//! function registry and invokes it with parsed JSON arguments (§4.D).
//!
//! This is the same [`crate::llm::BuiltinFunctionRegistry`] the tool-calling
//! loop (§4.G) dispatches `builtin`-kind functions through, surfaced here as
//! an ordinary node type so a workflow can call a builtin function directly
//! without going through an LLM.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::ConfigExt;
use crate::error::NodeError;
use crate::llm::BuiltinFunctionRegistry;
use crate::traits::{ExecutionContext, Executor};

pub struct FunctionCallExecutor {
    registry: Arc<BuiltinFunctionRegistry>,
}

impl FunctionCallExecutor {
    pub fn new(registry: Arc<BuiltinFunctionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Executor for FunctionCallExecutor {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        config: &Value,
        _input: &Value,
    ) -> Result<Value, NodeError> {
        let function_name = config.require_str("function_name")?;
        let arguments = config.get("arguments").cloned().unwrap_or_else(|| json!({}));
        let tool_call_id = config.get_str("tool_call_id", "");

        let handler = match self.registry.get(&function_name) {
            Some(h) => h,
            None => {
                return Ok(json!({
                    "function_name": function_name,
                    "tool_call_id": tool_call_id,
                    "success": false,
                    "result": Value::Null,
                    "error": format!("no builtin function registered as '{function_name}'"),
                }))
            }
        };

        match handler.call(ctx, arguments).await {
            Ok(result) => Ok(json!({
                "function_name": function_name,
                "tool_call_id": tool_call_id,
                "success": true,
                "result": result,
                "error": "",
            })),
            Err(e) => Ok(json!({
                "function_name": function_name,
                "tool_call_id": tool_call_id,
                "success": false,
                "result": Value::Null,
                "error": e.to_string(),
            })),
        }
    }

    fn validate(&self, config: &Value) -> Result<(), NodeError> {
        config.require_str("function_name")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::BuiltinFunction;
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    struct Echo;

    #[async_trait]
    impl BuiltinFunction for Echo {
        async fn call(&self, _ctx: &ExecutionContext, args: Value) -> Result<Value, NodeError> {
            Ok(args)
        }
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext {
            workflow_id: uuid::Uuid::new_v4(),
            execution_id: uuid::Uuid::new_v4(),
            node_id: "n1".into(),
            cancellation: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn known_function_returns_success_envelope() {
        let mut registry = BuiltinFunctionRegistry::new();
        registry.register("echo", Arc::new(Echo));
        let exec = FunctionCallExecutor::new(Arc::new(registry));

        let out = exec
            .execute(
                &ctx(),
                &json!({"function_name": "echo", "arguments": {"x": 1}}),
                &Value::Null,
            )
            .await
            .unwrap();
        assert_eq!(out["success"], json!(true));
        assert_eq!(out["result"], json!({"x": 1}));
    }

    #[tokio::test]
    async fn unknown_function_returns_failure_envelope_not_error() {
        let exec = FunctionCallExecutor::new(Arc::new(BuiltinFunctionRegistry::new()));
        let out = exec
            .execute(&ctx(), &json!({"function_name": "ghost"}), &Value::Null)
            .await
            .unwrap();
        assert_eq!(out["success"], json!(false));
    }
}
