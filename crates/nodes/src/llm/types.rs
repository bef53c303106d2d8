//! Normalized LLM request/response shapes (§4.D, §9) and tool-calling
//! configuration (§3 `ToolCallConfig`, §3 "Function definition").
//!
//! The core deliberately does not name a wire format — `LlmProviderBackend`
//! (defined in [`super::provider`]) is the leaky, per-vendor part, registered
//! by the embedding application at startup. What's normative here is the
//! shape both sides of that boundary agree on.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `functions[].kind` — the closed set of ways a tool-callable function can
/// be realized at execution time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    Builtin,
    SubWorkflow,
    CustomCode,
    Openapi,
}

/// A declarative record describing one callable surfaced to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub kind: FunctionKind,
    /// Name surfaced to the LLM (and matched against `ToolCall::name`).
    pub name: String,
    /// JSON-Schema parameter map, passed to the provider backend verbatim.
    pub parameters: Value,

    /// `kind: builtin` — name registered in [`super::registry::BuiltinFunctionRegistry`].
    pub builtin_name: Option<String>,

    /// `kind: sub_workflow` — the workflow to invoke.
    pub workflow_id: Option<String>,
    /// `kind: sub_workflow` — argument name -> workflow-variable input mapping.
    pub input_mapping: Option<Value>,
    /// `kind: sub_workflow` — expression extracting the tool result from the
    /// sub-workflow's node-output map.
    pub output_extractor: Option<String>,

    /// `kind: custom_code` — source language tag (small, declared set).
    pub language: Option<String>,
    /// `kind: custom_code` — source code passed to the sandbox verbatim.
    pub code: Option<String>,

    /// `kind: openapi` — the loaded spec document.
    pub openapi_spec: Option<Value>,
    /// `kind: openapi` — operation ID within `openapi_spec`.
    pub operation_id: Option<String>,
    /// `kind: openapi` — base URL override.
    pub base_url: Option<String>,
    /// `kind: openapi` — auth parameters (scheme-specific).
    pub auth: Option<Value>,
}

/// `tool_call_config` (§3, §6) — bounds and mode for the tool-calling loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ToolCallConfig {
    pub mode: ToolCallMode,
    pub max_iterations: u32,
    pub timeout_per_tool_secs: u64,
    pub total_timeout_secs: u64,
    pub stop_on_tool_failure: bool,
}

impl Default for ToolCallConfig {
    fn default() -> Self {
        Self {
            mode: ToolCallMode::Manual,
            max_iterations: 10,
            timeout_per_tool_secs: 30,
            total_timeout_secs: 300,
            stop_on_tool_failure: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallMode {
    Manual,
    Auto,
}

/// A single conversational message, provider-agnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Set on `role: "tool"` messages — the call this message answers.
    pub tool_call_id: Option<String>,
}

/// One tool call the model asked for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// JSON-encoded arguments, as the provider returned them.
    pub arguments: String,
}

/// The normalized request handed to an [`super::provider::LlmProviderBackend`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmRequest {
    pub provider: String,
    pub model: String,
    pub prompt: Option<String>,
    pub instructions: Option<String>,
    pub messages: Vec<Message>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub frequency_penalty: Option<f64>,
    pub presence_penalty: Option<f64>,
    pub max_tokens: Option<u32>,
    pub tools: Vec<FunctionDefinition>,
    pub response_format: Option<ResponseFormat>,
    pub input: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    Text,
    JsonObject,
    JsonSchema { name: String, schema: Value },
}

/// Token accounting normalized across providers.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Why the provider stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
}

/// The polymorphic `output_items` form newer-style providers return
/// alongside (or instead of) flat `content` (§9 Design Notes).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message { content: String },
    FunctionCall { call: ToolCall },
    SearchCall { query: String, results: Vec<Value> },
}

/// The normalized response produced by an [`super::provider::LlmProviderBackend`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: Option<String>,
    pub response_id: String,
    pub model: String,
    pub finish_reason: FinishReason,
    pub usage: Usage,
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_items: Vec<OutputItem>,
}
