//! Per-execution variable scopes.

use serde_json::{Map, Value};

/// The four disjoint scopes a placeholder can reference.
///
/// Immutable after construction and safe for concurrent reads; the `input`
/// field is the only thing that changes across a single execution, and it
/// changes by producing a new `VariableContext` per node dispatch rather than
/// mutating a shared one (see [`VariableContext::with_input`]).
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    /// Workflow-scoped variables, from the workflow definition.
    pub workflow: Map<String, Value>,
    /// Execution-scoped overrides, supplied when the execution was started.
    pub execution: Map<String, Value>,
    /// The collected input for the node currently being dispatched.
    pub input: Value,
    /// Named external resources (credentials, connections), looked up by alias.
    pub resource: Map<String, Value>,
}

impl VariableContext {
    pub fn new(
        workflow: Map<String, Value>,
        execution: Map<String, Value>,
        input: Value,
        resource: Map<String, Value>,
    ) -> Self {
        Self {
            workflow,
            execution,
            input,
            resource,
        }
    }

    /// Derive a new context with the same workflow/execution/resource scopes
    /// but a different `input` — this is what the node dispatcher does before
    /// every invocation.
    pub fn with_input(&self, input: Value) -> Self {
        Self {
            workflow: self.workflow.clone(),
            execution: self.execution.clone(),
            input,
            resource: self.resource.clone(),
        }
    }
}
