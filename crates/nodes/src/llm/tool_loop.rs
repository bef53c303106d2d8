//! The tool-calling loop (component G, §4.G): iterative LLM -> parse tool
//! calls -> execute tools -> feed results back -> LLM, bounded by iteration
//! count and timeouts.

use serde_json::Value;
use tokio::time::{timeout, Duration};

use crate::error::NodeError;
use crate::traits::ExecutionContext;

use super::provider::LlmProviderBackend;
use super::registry::ToolCallingRegistry;
use super::types::{FinishReason, FunctionDefinition, LlmRequest, Message, ToolCall, ToolCallConfig};

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoppedReason {
    Finish,
    MaxIterations,
}

/// Record of a single tool invocation, in call order.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolExecution {
    pub id: String,
    pub name: String,
    pub arguments: String,
    pub result: Option<Value>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolLoopOutcome {
    pub content: Option<String>,
    pub finish_reason: FinishReason,
    pub stopped_reason: StoppedReason,
    pub total_iterations: u32,
    pub messages: Vec<Message>,
    pub tool_executions: Vec<ToolExecution>,
}

/// Run the bounded LLM <-> tool-calling cycle starting from `initial_request`.
///
/// `functions` must be non-empty and `config.mode` must be `auto` for the
/// loop to actually dispatch tool calls; callers check that before invoking
/// this (the plain single-shot path in `super::executor` never calls it).
pub async fn run(
    ctx: &ExecutionContext,
    provider: &dyn LlmProviderBackend,
    tools: &ToolCallingRegistry,
    functions: &[FunctionDefinition],
    config: &ToolCallConfig,
    mut request: LlmRequest,
) -> Result<ToolLoopOutcome, NodeError> {
    request.tools = functions.to_vec();

    let total_timeout = Duration::from_secs(config.total_timeout_secs);
    let started = tokio::time::Instant::now();

    let mut messages = request.messages.clone();
    let mut tool_executions = Vec::new();
    let mut iterations = 0u32;

    loop {
        if ctx.is_canceled() {
            return Err(NodeError::Canceled);
        }

        iterations += 1;
        request.messages = messages.clone();

        let remaining = total_timeout.saturating_sub(started.elapsed());
        let response = timeout(remaining, provider.execute(request.clone()))
            .await
            .map_err(|_| NodeError::Timeout)??;

        if response.finish_reason != FinishReason::ToolCalls {
            if let Some(content) = &response.content {
                messages.push(Message {
                    role: "assistant".to_string(),
                    content: Some(content.clone()),
                    tool_calls: Vec::new(),
                    tool_call_id: None,
                });
            }
            return Ok(ToolLoopOutcome {
                content: response.content,
                finish_reason: response.finish_reason,
                stopped_reason: StoppedReason::Finish,
                total_iterations: iterations,
                messages,
                tool_executions,
            });
        }

        messages.push(Message {
            role: "assistant".to_string(),
            content: response.content.clone(),
            tool_calls: response.tool_calls.clone(),
            tool_call_id: None,
        });

        for call in &response.tool_calls {
            let function = functions.iter().find(|f| f.name == call.name);
            let Some(function) = function else {
                let error = format!("no function definition named '{}'", call.name);
                if config.stop_on_tool_failure {
                    return Err(NodeError::Fatal(error));
                }
                tool_executions.push(ToolExecution {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                    result: None,
                    error: Some(error.clone()),
                });
                messages.push(tool_result_message(call, &Err::<Value, _>(error)));
                continue;
            };

            let arguments: Value = serde_json::from_str(&call.arguments).unwrap_or(Value::Null);
            let per_tool_timeout = Duration::from_secs(config.timeout_per_tool_secs);
            let outcome = timeout(per_tool_timeout, tools.dispatch(ctx, function, arguments))
                .await
                .map_err(|_| NodeError::Timeout)?;

            match outcome {
                Ok(result) => {
                    tool_executions.push(ToolExecution {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                        result: Some(result.clone()),
                        error: None,
                    });
                    messages.push(tool_result_message(call, &Ok(result)));
                }
                Err(e) => {
                    if config.stop_on_tool_failure {
                        return Err(e);
                    }
                    let message = e.to_string();
                    tool_executions.push(ToolExecution {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                        result: None,
                        error: Some(message.clone()),
                    });
                    messages.push(tool_result_message(call, &Err(message)));
                }
            }
        }

        if iterations >= config.max_iterations {
            return Ok(ToolLoopOutcome {
                content: response.content,
                finish_reason: response.finish_reason,
                stopped_reason: StoppedReason::MaxIterations,
                total_iterations: iterations,
                messages,
                tool_executions,
            });
        }
    }
}

fn tool_result_message(call: &ToolCall, outcome: &Result<Value, String>) -> Message {
    let content = match outcome {
        Ok(value) => serde_json::to_string(value).unwrap_or_default(),
        Err(e) => serde_json::json!({"error": e}).to_string(),
    };
    Message {
        role: "tool".to_string(),
        content: Some(content),
        tool_calls: Vec::new(),
        tool_call_id: Some(call.id.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::MockProviderBackend;
    use crate::llm::registry::{BuiltinFunction, BuiltinFunctionRegistry};
    use crate::llm::types::{FunctionKind, LlmResponse, Usage};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> ExecutionContext {
        ExecutionContext {
            workflow_id: uuid::Uuid::new_v4(),
            execution_id: uuid::Uuid::new_v4(),
            node_id: "n1".into(),
            cancellation: CancellationToken::new(),
        }
    }

    struct GetWeather;
    #[async_trait]
    impl BuiltinFunction for GetWeather {
        async fn call(&self, _ctx: &ExecutionContext, _args: Value) -> Result<Value, NodeError> {
            Ok(json!({"temperature": 22}))
        }
    }

    struct GetTime;
    #[async_trait]
    impl BuiltinFunction for GetTime {
        async fn call(&self, _ctx: &ExecutionContext, _args: Value) -> Result<Value, NodeError> {
            Ok(json!({"time": "14:30"}))
        }
    }

    fn function_def(name: &str) -> FunctionDefinition {
        FunctionDefinition {
            kind: FunctionKind::Builtin,
            name: name.to_string(),
            parameters: json!({}),
            builtin_name: Some(name.to_string()),
            workflow_id: None,
            input_mapping: None,
            output_extractor: None,
            language: None,
            code: None,
            openapi_spec: None,
            operation_id: None,
            base_url: None,
            auth: None,
        }
    }

    fn tool_call(id: &str, name: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: "{}".to_string(),
        }
    }

    fn assistant_response(finish: FinishReason, calls: Vec<ToolCall>, content: Option<&str>) -> LlmResponse {
        LlmResponse {
            content: content.map(str::to_string),
            response_id: "r".to_string(),
            model: "mock".to_string(),
            finish_reason: finish,
            usage: Usage::default(),
            tool_calls: calls,
            output_items: Vec::new(),
        }
    }

    fn registry() -> ToolCallingRegistry {
        let mut builtins = BuiltinFunctionRegistry::new();
        builtins.register("get_weather", Arc::new(GetWeather));
        builtins.register("get_time", Arc::new(GetTime));
        ToolCallingRegistry::new(Arc::new(builtins))
    }

    #[tokio::test]
    async fn three_iteration_conversation_finishes_with_content() {
        let provider = MockProviderBackend::scripted(vec![
            assistant_response(
                FinishReason::ToolCalls,
                vec![tool_call("call_1", "get_weather")],
                None,
            ),
            assistant_response(
                FinishReason::ToolCalls,
                vec![tool_call("call_2", "get_time")],
                None,
            ),
            assistant_response(FinishReason::Stop, vec![], Some("It's 14:30 and 22°C")),
        ]);

        let functions = vec![function_def("get_weather"), function_def("get_time")];
        let config = ToolCallConfig::default();
        let outcome = run(
            &ctx(),
            &provider,
            &registry(),
            &functions,
            &config,
            LlmRequest::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.total_iterations, 3);
        assert_eq!(outcome.stopped_reason, StoppedReason::Finish);
        assert_eq!(outcome.tool_executions.len(), 2);
        assert_eq!(outcome.tool_executions[0].name, "get_weather");
        assert_eq!(outcome.tool_executions[1].name, "get_time");
        assert_eq!(outcome.content.as_deref(), Some("It's 14:30 and 22°C"));
    }

    #[tokio::test]
    async fn hits_max_iterations_when_provider_always_calls_tools() {
        let scripted: Vec<LlmResponse> = (0..3)
            .map(|i| {
                assistant_response(
                    FinishReason::ToolCalls,
                    vec![tool_call(&format!("call_{i}"), "get_weather")],
                    None,
                )
            })
            .collect();
        let provider = MockProviderBackend::scripted(scripted);

        let functions = vec![function_def("get_weather")];
        let config = ToolCallConfig {
            max_iterations: 3,
            ..Default::default()
        };
        let outcome = run(
            &ctx(),
            &provider,
            &registry(),
            &functions,
            &config,
            LlmRequest::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.total_iterations, 3);
        assert_eq!(outcome.stopped_reason, StoppedReason::MaxIterations);
        assert_eq!(outcome.tool_executions.len(), 3);
    }
}
