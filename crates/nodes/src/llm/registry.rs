//! Tool-calling backends (§4.G, §6): the registry the tool-calling loop
//! dispatches through, one branch per [`super::types::FunctionKind`].
//!
//! Three backend traits are external collaborators — concrete sub-workflow /
//! sandbox / OpenAPI implementations live outside the core, matching the
//! spec's framing of "tool-calling backends" (§6). `BuiltinFunctionRegistry`
//! is the one piece that lives in-process, since builtin functions are
//! ordinary Rust closures registered at startup.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::NodeError;
use crate::traits::ExecutionContext;

use super::types::FunctionDefinition;

/// A single builtin function callable from the tool-calling loop or from the
/// `function_call` node type.
#[async_trait]
pub trait BuiltinFunction: Send + Sync {
    async fn call(&self, ctx: &ExecutionContext, args: Value) -> Result<Value, NodeError>;
}

#[derive(Default, Clone)]
pub struct BuiltinFunctionRegistry {
    functions: HashMap<String, Arc<dyn BuiltinFunction>>,
}

impl BuiltinFunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, f: Arc<dyn BuiltinFunction>) {
        self.functions.insert(name.into(), f);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn BuiltinFunction>> {
        self.functions.get(name).cloned()
    }
}

/// `kind: sub_workflow` — runs a workflow as a tool call via an injected
/// workflow executor (the `engine` crate, from the other side of the
/// dependency graph — hence this trait rather than a direct dependency).
#[async_trait]
pub trait SubWorkflowExecutor: Send + Sync {
    async fn execute_workflow(&self, workflow_id: &str, input: Value) -> Result<Value, NodeError>;
}

/// `kind: custom_code` — runs source through a sandboxed interpreter.
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    async fn execute_code(&self, language: &str, code: &str, args: Value) -> Result<Value, NodeError>;
}

/// `kind: openapi` — binds arguments to a named operation of a loaded spec.
#[async_trait]
pub trait OpenApiExecutor: Send + Sync {
    async fn execute_operation(
        &self,
        spec: &Value,
        operation_id: &str,
        base_url: &str,
        args: Value,
        auth: &Value,
    ) -> Result<Value, NodeError>;
}

/// Dispatches a [`FunctionDefinition`] + JSON arguments to the right backend.
#[derive(Clone)]
pub struct ToolCallingRegistry {
    pub builtins: Arc<BuiltinFunctionRegistry>,
    pub sub_workflows: Option<Arc<dyn SubWorkflowExecutor>>,
    pub code: Option<Arc<dyn CodeExecutor>>,
    pub openapi: Option<Arc<dyn OpenApiExecutor>>,
}

impl ToolCallingRegistry {
    pub fn new(builtins: Arc<BuiltinFunctionRegistry>) -> Self {
        Self {
            builtins,
            sub_workflows: None,
            code: None,
            openapi: None,
        }
    }

    pub async fn dispatch(
        &self,
        ctx: &ExecutionContext,
        function: &FunctionDefinition,
        arguments: Value,
    ) -> Result<Value, NodeError> {
        use super::types::FunctionKind::*;
        match function.kind {
            Builtin => {
                let name = function
                    .builtin_name
                    .as_deref()
                    .unwrap_or(function.name.as_str());
                let handler = self
                    .builtins
                    .get(name)
                    .ok_or_else(|| NodeError::Fatal(format!("no builtin function '{name}'")))?;
                handler.call(ctx, arguments).await
            }
            SubWorkflow => {
                let backend = self
                    .sub_workflows
                    .as_ref()
                    .ok_or_else(|| NodeError::Fatal("no sub-workflow executor registered".into()))?;
                let workflow_id = function
                    .workflow_id
                    .as_deref()
                    .ok_or_else(|| NodeError::Fatal("sub_workflow function missing workflow_id".into()))?;
                let mapped = apply_input_mapping(function.input_mapping.as_ref(), &arguments);
                let result = backend.execute_workflow(workflow_id, mapped).await?;
                Ok(match &function.output_extractor {
                    Some(expr) => extract_output(expr, &result),
                    None => result,
                })
            }
            CustomCode => {
                let backend = self
                    .code
                    .as_ref()
                    .ok_or_else(|| NodeError::Fatal("no code executor registered".into()))?;
                let language = function
                    .language
                    .as_deref()
                    .ok_or_else(|| NodeError::Fatal("custom_code function missing language".into()))?;
                let code = function
                    .code
                    .as_deref()
                    .ok_or_else(|| NodeError::Fatal("custom_code function missing code".into()))?;
                backend.execute_code(language, code, arguments).await
            }
            Openapi => {
                let backend = self
                    .openapi
                    .as_ref()
                    .ok_or_else(|| NodeError::Fatal("no openapi executor registered".into()))?;
                let spec = function
                    .openapi_spec
                    .as_ref()
                    .ok_or_else(|| NodeError::Fatal("openapi function missing openapi_spec".into()))?;
                let operation_id = function
                    .operation_id
                    .as_deref()
                    .ok_or_else(|| NodeError::Fatal("openapi function missing operation_id".into()))?;
                let base_url = function.base_url.as_deref().unwrap_or("");
                let auth = function.auth.clone().unwrap_or(Value::Null);
                backend
                    .execute_operation(spec, operation_id, base_url, arguments, &auth)
                    .await
            }
        }
    }
}

/// Remap tool-call arguments onto workflow-variable inputs per
/// `argument_name -> workflow_variable_name` entries in `mapping`.
fn apply_input_mapping(mapping: Option<&Value>, arguments: &Value) -> Value {
    let Some(mapping) = mapping.and_then(Value::as_object) else {
        return arguments.clone();
    };
    let mut out = serde_json::Map::new();
    for (arg_name, var_name) in mapping {
        if let Some(value) = arguments.get(arg_name) {
            let key = var_name.as_str().unwrap_or(arg_name.as_str());
            out.insert(key.to_string(), value.clone());
        }
    }
    Value::Object(out)
}

/// A deliberately tiny "extractor expression" language: a dotted path into
/// the sub-workflow's node-output map (same grammar as template paths).
fn extract_output(expr: &str, result: &Value) -> Value {
    match template::path::parse(expr) {
        Ok(segments) => template::path::navigate(result, &segments)
            .cloned()
            .unwrap_or(Value::Null),
        Err(_) => result.clone(),
    }
}
