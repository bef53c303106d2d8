//! Core domain models for the workflow engine (§3).
//!
//! These types are the source of truth for what a workflow and an execution
//! look like in memory. They serialize to/from the JSONB `definition` column
//! of the `workflows` table and the `workflow_executions`/`node_executions`
//! rows (see `db::models` for the persistence-row shapes).

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// How a workflow is started. Opaque to the graph scheduler — resolved by
/// the REST/worker layer into an `Execution` before the scheduler ever runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Triggered by an incoming HTTP request to `/webhook/{path}`.
    Webhook { path: String },
    /// Triggered manually via the REST API.
    Manual,
    /// Triggered on a cron schedule.
    Cron { expression: String },
}

// ---------------------------------------------------------------------------
// NodeSpec / EdgeSpec
// ---------------------------------------------------------------------------

/// Optional bounded-retry policy carried by a node specification (§4.E).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// A single step in the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Unique identifier within this workflow (referenced by edges).
    pub id: String,
    /// Maps to a registered executor in [`nodes::ExecutorRegistry`].
    pub node_type: String,
    /// Human-readable name, carried into the [`NodeExecution`] record.
    pub name: String,
    /// Arbitrary configuration, possibly containing `{{scope.path}}`
    /// template placeholders resolved at dispatch time.
    pub config: Value,
    /// Per-node timeout overlay, if any.
    pub timeout_ms: Option<u64>,
    /// Per-node retry policy, if any.
    pub retry: Option<RetryPolicy>,
    /// When true, a failure of this node does not fail the execution — its
    /// output becomes a conventional error-payload sentinel and dependents
    /// run normally (§4.F Failure policy).
    pub continue_on_error: bool,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>, config: Value) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            node_type: node_type.into(),
            config,
            timeout_ms: None,
            retry: None,
            continue_on_error: false,
        }
    }
}

/// Directed edge from one node to another, optionally labeled for a
/// conditional source's `true`/`false` branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub id: String,
    pub from: String,
    pub to: String,
    /// `Some("true")` / `Some("false")` for a conditional source's branches;
    /// `None` for an unconditional edge.
    pub condition: Option<String>,
}

impl EdgeSpec {
    pub fn new(id: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            condition: None,
        }
    }

    pub fn conditional(
        id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        condition: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            condition: Some(condition.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A complete, reusable workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
    pub version: Option<String>,
    pub trigger: Trigger,
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<EdgeSpec>,
    /// Workflow-scoped variables (`{{env.X}}` second precedence tier).
    pub variables: Map<String, Value>,
    /// Opt into `partial` as a terminal status when some nodes succeeded and
    /// some were skipped with none failed (§4.F Termination).
    pub allow_partial_completion: bool,
    pub created_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(name: impl Into<String>, nodes: Vec<NodeSpec>, edges: Vec<EdgeSpec>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            version: None,
            trigger: Trigger::Manual,
            nodes,
            edges,
            variables: Map::new(),
            allow_partial_completion: false,
            created_at: Utc::now(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

// ---------------------------------------------------------------------------
// Statuses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
    Partial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

// ---------------------------------------------------------------------------
// NodeExecution / Execution
// ---------------------------------------------------------------------------

/// Per-node run record (§3). Created on first scheduling of the node,
/// mutated exactly once to a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecution {
    pub node_id: String,
    pub node_name: String,
    pub status: NodeStatus,
    /// The merged parent outputs that fed this node.
    pub inputs: Value,
    pub output: Option<Value>,
    /// Empty on success.
    pub error: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl NodeExecution {
    pub fn pending(node: &NodeSpec, inputs: Value) -> Self {
        Self {
            node_id: node.id.clone(),
            node_name: node.name.clone(),
            status: NodeStatus::Pending,
            inputs,
            output: None,
            error: String::new(),
            started_at: None,
            finished_at: None,
        }
    }
}

/// Single run of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub input: Value,
    pub execution_variables: Map<String, Value>,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub nodes: HashMap<String, NodeExecution>,
}

impl Execution {
    pub fn new(workflow_id: Uuid, input: Value, execution_variables: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            input,
            execution_variables,
            status: ExecutionStatus::Pending,
            started_at: Utc::now(),
            finished_at: None,
            nodes: HashMap::new(),
        }
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}
