//! LLM executor and tool-calling sub-engine (components D's LLM family + G).

pub mod executor;
pub mod provider;
pub mod registry;
pub mod tool_loop;
pub mod types;

pub use executor::LlmExecutor;
pub use provider::{LlmProviderBackend, MockProviderBackend};
pub use registry::{
    BuiltinFunction, BuiltinFunctionRegistry, CodeExecutor, OpenApiExecutor, SubWorkflowExecutor,
    ToolCallingRegistry,
};
pub use tool_loop::{StoppedReason, ToolExecution, ToolLoopOutcome};
pub use types::{
    FinishReason, FunctionDefinition, FunctionKind, LlmRequest, LlmResponse, Message, OutputItem,
    ResponseFormat, ToolCall, ToolCallConfig, ToolCallMode, Usage,
};
