//! `nodes` crate — the [`Executor`] contract, the executor registry, the
//! template-resolution wrapper, and the built-in executor family.
//!
//! Every node type — built-in or user-registered — implements [`Executor`].
//! The engine crate dispatches execution through this trait object, wrapped
//! by [`wrapper::wrap`] so config placeholders are resolved immediately
//! before the inner executor runs.

pub mod config;
pub mod error;
pub mod executors;
pub mod llm;
pub mod registry;
pub mod traits;
pub mod wrapper;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use config::ConfigExt;
pub use error::NodeError;
pub use registry::ExecutorRegistry;
pub use traits::{ExecutionContext, Executor};
pub use wrapper::wrap;

/// Register every built-in executor (component D) under its conventional
/// `node_type` string. Called once at process startup by the embedding
/// application (the `cli` crate), mirroring how LLM provider backends and
/// tool-calling backends are wired up alongside it.
pub fn register_builtins(
    registry: &ExecutorRegistry,
    file_storage: std::sync::Arc<dyn executors::file_storage::FileStorageBackend>,
    llm: llm::LlmExecutor,
    function_call_registry: std::sync::Arc<llm::BuiltinFunctionRegistry>,
) -> Result<(), NodeError> {
    registry.register("http", std::sync::Arc::new(executors::http::HttpExecutor::new()))?;
    registry.register("transform", std::sync::Arc::new(executors::transform::TransformExecutor))?;
    registry.register("conditional", std::sync::Arc::new(executors::conditional::ConditionalExecutor))?;
    registry.register("merge", std::sync::Arc::new(executors::merge::MergeExecutor))?;
    registry.register(
        "file_storage",
        std::sync::Arc::new(executors::file_storage::FileStorageExecutor::new(file_storage)),
    )?;
    registry.register("llm", std::sync::Arc::new(llm))?;
    registry.register(
        "function_call",
        std::sync::Arc::new(executors::function_call::FunctionCallExecutor::new(function_call_registry)),
    )?;
    Ok(())
}
