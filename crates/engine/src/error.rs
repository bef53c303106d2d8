//! Engine-level error types.

use thiserror::Error;

/// Errors produced by the workflow engine (validation + orchestration).
///
/// Per-node business failures are *not* represented here — they're captured
/// as data in the [`crate::models::NodeExecution`] record itself, and the
/// scheduler folds them into the execution's terminal status (§4.F). This
/// type covers only structural problems: a malformed graph, or the engine
/// failing to even run (registry/database trouble).
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Validation errors ------
    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// An edge references a node ID that doesn't exist in the workflow.
    #[error("edge references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference { node_id: String, side: &'static str },

    /// Topological sort detected a cycle.
    #[error("workflow graph contains a cycle")]
    CycleDetected,

    /// A node's `node_type` has no registered executor, or its config fails
    /// that executor's authoring-time validation.
    #[error("node '{node_id}' failed validation: {message}")]
    NodeInvalid { node_id: String, message: String },

    // ------ Execution errors ------
    /// Persistence error from the db crate.
    #[error("database error: {0}")]
    Database(#[from] db::DbError),
}
