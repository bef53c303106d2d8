//! Graph scheduler (component F): the single-owner state machine that walks
//! a workflow's DAG to completion.
//!
//! Implemented as one async task holding all DAG-mutation state locally — no
//! node-execution code ever touches scheduler state directly. Node dispatches
//! run concurrently as spawned tasks; each reports its terminal
//! [`NodeExecution`] back over an mpsc channel, and the owning task applies
//! every state transition sequentially as those reports arrive (§5
//! "single-owner" requirement).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use nodes::executors::merge::MergeStrategy;

use crate::dispatcher::NodeDispatcher;
use crate::models::{EdgeSpec, Execution, ExecutionStatus, NodeExecution, NodeSpec, NodeStatus, Workflow};

pub struct GraphScheduler {
    dispatcher: Arc<NodeDispatcher>,
}

impl GraphScheduler {
    pub fn new(dispatcher: Arc<NodeDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Run `workflow` to completion for the given `execution`, honoring
    /// `cancellation`. Always returns — node-level failures are folded into
    /// the execution's terminal status, never surfaced as `Err`.
    #[instrument(skip(self, workflow, execution, resources), fields(execution_id = %execution.id))]
    pub async fn run(
        &self,
        workflow: &Workflow,
        mut execution: Execution,
        resources: Map<String, Value>,
        cancellation: CancellationToken,
    ) -> Execution {
        execution.status = ExecutionStatus::Running;

        let incoming: HashMap<&str, Vec<&EdgeSpec>> = {
            let mut m: HashMap<&str, Vec<&EdgeSpec>> = HashMap::new();
            for edge in &workflow.edges {
                m.entry(edge.to.as_str()).or_default().push(edge);
            }
            m
        };

        let var_ctx = template::VariableContext::new(
            workflow.variables.clone(),
            execution.execution_variables.clone(),
            Value::Null,
            resources,
        );

        let mut node_outputs: HashMap<String, Value> = HashMap::new();
        let mut terminal: HashMap<String, NodeStatus> = HashMap::new();
        let mut dispatched: std::collections::HashSet<String> = std::collections::HashSet::new();
        let mut in_flight = 0usize;
        let mut fatal = false;

        let (tx, mut rx) = mpsc::unbounded_channel::<NodeExecution>();

        loop {
            let mut ready: Vec<(NodeSpec, Value)> = Vec::new();
            let mut to_skip: Vec<String> = Vec::new();

            for node in &workflow.nodes {
                if dispatched.contains(&node.id) || terminal.contains_key(&node.id) {
                    continue;
                }

                let preds = incoming.get(node.id.as_str()).cloned().unwrap_or_default();
                if preds.is_empty() {
                    ready.push((node.clone(), execution.input.clone()));
                    continue;
                }

                let strategy = if node.node_type == "merge" {
                    MergeStrategy::from_config(&node.config)
                } else {
                    MergeStrategy::All
                };

                let mut active: Vec<(&EdgeSpec, Value)> = Vec::new();
                let mut any_pending = false;

                for edge in &preds {
                    match terminal.get(edge.from.as_str()) {
                        None => any_pending = true,
                        Some(NodeStatus::Skipped) => {}
                        Some(NodeStatus::Failed) => {
                            let src = workflow.node(&edge.from);
                            if src.map(|n| n.continue_on_error).unwrap_or(false) && edge.condition.is_none() {
                                let sentinel = execution
                                    .nodes
                                    .get(&edge.from)
                                    .map(error_sentinel)
                                    .unwrap_or(Value::Null);
                                active.push((edge, sentinel));
                            }
                        }
                        Some(NodeStatus::Succeeded) => {
                            let is_conditional =
                                workflow.node(&edge.from).map(|n| n.node_type == "conditional").unwrap_or(false);
                            let output = node_outputs.get(&edge.from).cloned().unwrap_or(Value::Null);
                            let branch_active = if is_conditional {
                                match (&edge.condition, output.as_bool()) {
                                    (Some(label), Some(b)) => (label == "true") == b,
                                    _ => false,
                                }
                            } else {
                                true
                            };
                            if branch_active {
                                active.push((edge, output));
                            }
                        }
                        Some(NodeStatus::Pending) | Some(NodeStatus::Running) => unreachable!(
                            "terminal map only ever holds terminal statuses"
                        ),
                    }
                }

                match strategy {
                    MergeStrategy::Any => {
                        if let Some((_, first)) = active.first() {
                            ready.push((node.clone(), first.clone()));
                        } else if !any_pending {
                            to_skip.push(node.id.clone());
                        }
                    }
                    MergeStrategy::All => {
                        if any_pending {
                            continue;
                        }
                        if active.is_empty() {
                            to_skip.push(node.id.clone());
                        } else if node.node_type == "merge" || active.len() > 1 {
                            let merged: Map<String, Value> = active
                                .into_iter()
                                .map(|(edge, output)| (edge.from.clone(), output))
                                .collect();
                            ready.push((node.clone(), Value::Object(merged)));
                        } else {
                            ready.push((node.clone(), active.into_iter().next().unwrap().1));
                        }
                    }
                }
            }

            if fatal {
                // Once a non-continuable failure has occurred, no further
                // dispatches are issued — every node that would otherwise
                // have become ready is skipped instead, alongside whatever
                // `to_skip` already found via pruned/failed predecessors.
                to_skip.extend(ready.drain(..).map(|(node, _)| node.id));
            }

            for node_id in to_skip {
                terminal.insert(node_id.clone(), NodeStatus::Skipped);
                let node = workflow.node(&node_id).expect("skip target must exist");
                let mut record = NodeExecution::pending(node, Value::Null);
                record.status = NodeStatus::Skipped;
                record.finished_at = Some(chrono::Utc::now());
                execution.nodes.insert(node_id, record);
            }

            for (node, input) in ready {
                dispatched.insert(node.id.clone());
                in_flight += 1;
                self.spawn_dispatch(&node, &var_ctx, input, &execution, cancellation.clone(), tx.clone());
            }

            if in_flight == 0 {
                break;
            }

            let Some(finished) = rx.recv().await else { break };
            in_flight -= 1;

            let node_id = finished.node_id.clone();
            terminal.insert(node_id.clone(), finished.status);
            if let Some(output) = &finished.output {
                node_outputs.insert(node_id.clone(), output.clone());
            }
            execution.nodes.insert(node_id.clone(), finished.clone());

            if finished.status == NodeStatus::Failed {
                let node = workflow.node(&node_id);
                let continues = node.map(|n| n.continue_on_error).unwrap_or(false);
                warn!(node_id = %node_id, error = %finished.error, "node failed");
                if !continues {
                    fatal = true;
                    cancellation.cancel();
                }
            }
        }

        execution.finished_at = Some(chrono::Utc::now());
        execution.status = reduce_status(workflow, &execution, cancellation.is_cancelled() && !fatal, fatal);

        match execution.status {
            ExecutionStatus::Succeeded => info!(execution_id = %execution.id, "execution succeeded"),
            ExecutionStatus::Failed => error!(execution_id = %execution.id, "execution failed"),
            _ => info!(execution_id = %execution.id, status = ?execution.status, "execution finished"),
        }

        execution
    }

    fn spawn_dispatch(
        &self,
        node: &NodeSpec,
        var_ctx: &template::VariableContext,
        input: Value,
        execution: &Execution,
        cancellation: CancellationToken,
        tx: mpsc::UnboundedSender<NodeExecution>,
    ) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let node = node.clone();
        let var_ctx = var_ctx.clone();
        let workflow_id = execution.workflow_id;
        let execution_id = execution.id;

        tokio::spawn(async move {
            let record = dispatcher
                .dispatch(&node, &var_ctx, input, workflow_id, execution_id, cancellation)
                .await;
            let _ = tx.send(record);
        });
    }
}

fn error_sentinel(record: &NodeExecution) -> Value {
    serde_json::json!({"error": record.error})
}

/// Pure function of every node's terminal status, the cancellation flag, and
/// the workflow's partial-completion opt-in (§4.F Termination).
fn reduce_status(workflow: &Workflow, execution: &Execution, canceled: bool, any_fatal_failure: bool) -> ExecutionStatus {
    if canceled {
        return ExecutionStatus::Canceled;
    }
    let any_failed = execution.nodes.values().any(|n| n.status == NodeStatus::Failed);
    if any_failed && any_fatal_failure {
        return ExecutionStatus::Failed;
    }
    let any_skipped = execution.nodes.values().any(|n| n.status == NodeStatus::Skipped);
    if any_skipped {
        if workflow.allow_partial_completion {
            return ExecutionStatus::Partial;
        }
        if any_failed {
            return ExecutionStatus::Failed;
        }
    }
    ExecutionStatus::Succeeded
}
