//! LLM executor: normalizes config into an [`LlmRequest`], delegates wire
//! formatting to a per-provider [`LlmProviderBackend`], and — when
//! `tool_call_config.mode = auto` with a non-empty `functions` list — drives
//! the tool-calling loop (§4.G) instead of a single call.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::ConfigExt;
use crate::error::NodeError;
use crate::traits::{ExecutionContext, Executor};

use super::provider::LlmProviderBackend;
use super::registry::ToolCallingRegistry;
use super::tool_loop;
use super::types::{
    FunctionDefinition, LlmRequest, Message, ResponseFormat, ToolCallConfig, ToolCallMode,
};

pub struct LlmExecutor {
    backends: HashMap<String, Arc<dyn LlmProviderBackend>>,
    tools: ToolCallingRegistry,
}

impl LlmExecutor {
    pub fn new(
        backends: HashMap<String, Arc<dyn LlmProviderBackend>>,
        tools: ToolCallingRegistry,
    ) -> Self {
        Self { backends, tools }
    }
}

#[async_trait]
impl Executor for LlmExecutor {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        config: &Value,
        input: &Value,
    ) -> Result<Value, NodeError> {
        let provider_name = config.require_str("provider")?;
        let backend = self
            .backends
            .get(&provider_name)
            .ok_or_else(|| NodeError::Fatal(format!("no LLM provider backend for '{provider_name}'")))?;

        let request = build_request(config, input)?;
        let functions = parse_functions(config)?;
        let tool_call_config = parse_tool_call_config(config);

        if tool_call_config.mode == ToolCallMode::Auto && !functions.is_empty() {
            let outcome = tool_loop::run(
                ctx,
                backend.as_ref(),
                &self.tools,
                &functions,
                &tool_call_config,
                request,
            )
            .await?;
            return Ok(serde_json::to_value(outcome).expect("ToolLoopOutcome always serializes"));
        }

        let response = backend.execute(request).await?;
        Ok(serde_json::to_value(response).expect("LlmResponse always serializes"))
    }

    fn validate(&self, config: &Value) -> Result<(), NodeError> {
        config.require_str("provider")?;
        config.require_str("model")?;
        if let Some(temp) = config.get("temperature").and_then(Value::as_f64) {
            if !(0.0..=2.0).contains(&temp) {
                return Err(NodeError::Fatal("temperature must be within 0..2".into()));
            }
        }
        if let Some(top_p) = config.get("top_p").and_then(Value::as_f64) {
            if !(0.0..=1.0).contains(&top_p) {
                return Err(NodeError::Fatal("top_p must be within 0..1".into()));
            }
        }
        Ok(())
    }
}

fn build_request(config: &Value, input: &Value) -> Result<LlmRequest, NodeError> {
    let use_input_directly = config.get_bool("use_input_directly", false);
    let explicit_input = config.get("input").cloned();
    let resolved_input = explicit_input.or_else(|| use_input_directly.then(|| input.clone()));

    let messages = config
        .get("messages")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|m| serde_json::from_value::<Message>(m.clone()).ok())
                .collect()
        })
        .unwrap_or_default();

    Ok(LlmRequest {
        provider: config.require_str("provider")?,
        model: config.require_str("model")?,
        prompt: config.get("prompt").and_then(Value::as_str).map(str::to_string),
        instructions: config
            .get("instructions")
            .or_else(|| config.get("instruction"))
            .and_then(Value::as_str)
            .map(str::to_string),
        messages,
        temperature: config.get("temperature").and_then(Value::as_f64),
        top_p: config.get("top_p").and_then(Value::as_f64),
        frequency_penalty: config.get("frequency_penalty").and_then(Value::as_f64),
        presence_penalty: config.get("presence_penalty").and_then(Value::as_f64),
        max_tokens: config.get("max_tokens").and_then(Value::as_u64).map(|v| v as u32),
        tools: Vec::new(),
        response_format: parse_response_format(config),
        input: resolved_input,
    })
}

fn parse_response_format(config: &Value) -> Option<ResponseFormat> {
    match config.get("response_format")? {
        Value::String(s) if s == "text" => Some(ResponseFormat::Text),
        Value::String(s) if s == "json_object" => Some(ResponseFormat::JsonObject),
        Value::Object(obj) if obj.get("type").and_then(Value::as_str) == Some("json_schema") => {
            Some(ResponseFormat::JsonSchema {
                name: obj.get("name").and_then(Value::as_str).unwrap_or("response").to_string(),
                schema: obj.get("schema").cloned().unwrap_or(json!({})),
            })
        }
        _ => None,
    }
}

fn parse_functions(config: &Value) -> Result<Vec<FunctionDefinition>, NodeError> {
    let Some(functions) = config.get("functions").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };
    functions
        .iter()
        .map(|f| {
            serde_json::from_value(f.clone())
                .map_err(|e| NodeError::Fatal(format!("invalid function definition: {e}")))
        })
        .collect()
}

fn parse_tool_call_config(config: &Value) -> ToolCallConfig {
    let Some(tcc) = config.get("tool_call_config") else {
        return ToolCallConfig::default();
    };
    let default = ToolCallConfig::default();
    ToolCallConfig {
        mode: match tcc.get("mode").and_then(Value::as_str) {
            Some("auto") => ToolCallMode::Auto,
            _ => ToolCallMode::Manual,
        },
        max_iterations: tcc
            .get("max_iterations")
            .and_then(Value::as_u64)
            .map(|v| v as u32)
            .unwrap_or(default.max_iterations),
        timeout_per_tool_secs: tcc
            .get("timeout_per_tool")
            .and_then(Value::as_u64)
            .unwrap_or(default.timeout_per_tool_secs),
        total_timeout_secs: tcc
            .get("total_timeout")
            .and_then(Value::as_u64)
            .unwrap_or(default.total_timeout_secs),
        stop_on_tool_failure: tcc
            .get("stop_on_tool_failure")
            .and_then(Value::as_bool)
            .unwrap_or(default.stop_on_tool_failure),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::MockProviderBackend;
    use crate::llm::registry::BuiltinFunctionRegistry;
    use crate::llm::types::{FinishReason, LlmResponse, Usage};
    use tokio_util::sync::CancellationToken;

    fn ctx() -> ExecutionContext {
        ExecutionContext {
            workflow_id: uuid::Uuid::new_v4(),
            execution_id: uuid::Uuid::new_v4(),
            node_id: "n1".into(),
            cancellation: CancellationToken::new(),
        }
    }

    fn single_response(content: &str) -> LlmResponse {
        LlmResponse {
            content: Some(content.to_string()),
            response_id: "r1".into(),
            model: "mock".into(),
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
            tool_calls: Vec::new(),
            output_items: Vec::new(),
        }
    }

    #[tokio::test]
    async fn single_shot_call_returns_normalized_response() {
        let backend: Arc<dyn LlmProviderBackend> =
            Arc::new(MockProviderBackend::scripted(vec![single_response("hi")]));
        let mut backends: HashMap<String, Arc<dyn LlmProviderBackend>> = HashMap::new();
        backends.insert("mock".into(), backend);

        let exec = LlmExecutor::new(
            backends,
            ToolCallingRegistry::new(Arc::new(BuiltinFunctionRegistry::new())),
        );
        let out = exec
            .execute(
                &ctx(),
                &json!({"provider": "mock", "model": "m1", "prompt": "hello"}),
                &json!({}),
            )
            .await
            .unwrap();
        assert_eq!(out["content"], json!("hi"));
    }

    #[test]
    fn validate_rejects_out_of_range_temperature() {
        let exec = LlmExecutor::new(HashMap::new(), ToolCallingRegistry::new(Arc::new(BuiltinFunctionRegistry::new())));
        let err = exec
            .validate(&json!({"provider": "mock", "model": "m1", "temperature": 3.0}))
            .unwrap_err();
        assert!(matches!(err, NodeError::Fatal(_)));
    }
}
