//! Tests for [`WorkflowExecutor::validate`].
//!
//! `WorkflowExecutor::run` needs a live Postgres pool, so it isn't exercised
//! here — the scheduler and dispatcher it delegates to are covered directly
//! in `scheduler.rs`/`dispatcher.rs`, against a mock executor registry.

use std::sync::Arc;

use serde_json::json;
use sqlx::postgres::PgPoolOptions;

use crate::executor::{ExecutorConfig, WorkflowExecutor};
use crate::models::{EdgeSpec, NodeSpec, Workflow};
use nodes::mock::MockExecutor;
use nodes::ExecutorRegistry;

/// `validate` never touches the pool, so a lazily-connecting one (no actual
/// TCP handshake until first query) is enough to build a `WorkflowExecutor`.
fn validator_with(registry: ExecutorRegistry) -> WorkflowExecutor {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_lazy("postgres://localhost/nonexistent")
        .expect("lazy pool construction never connects");
    WorkflowExecutor::new(pool, registry, ExecutorConfig::default())
}

#[test]
fn valid_linear_workflow_passes() {
    let registry = ExecutorRegistry::new();
    registry.register("mock", Arc::new(MockExecutor::returning("m", json!({})))).unwrap();

    let nodes = vec![NodeSpec::new("a", "mock", json!({})), NodeSpec::new("b", "mock", json!({}))];
    let edges = vec![EdgeSpec::new("e1", "a", "b")];
    let workflow = Workflow::new("wf", nodes, edges);

    let executor = validator_with(registry);
    let order = executor.validate(&workflow).unwrap();
    assert_eq!(order, vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn cycle_is_rejected() {
    let registry = ExecutorRegistry::new();
    registry.register("mock", Arc::new(MockExecutor::returning("m", json!({})))).unwrap();

    let nodes = vec![NodeSpec::new("a", "mock", json!({})), NodeSpec::new("b", "mock", json!({}))];
    let edges = vec![EdgeSpec::new("e1", "a", "b"), EdgeSpec::new("e2", "b", "a")];
    let workflow = Workflow::new("wf", nodes, edges);

    let executor = validator_with(registry);
    assert!(executor.validate(&workflow).is_err());
}

#[test]
fn unregistered_node_type_is_rejected() {
    let registry = ExecutorRegistry::new();
    let nodes = vec![NodeSpec::new("a", "ghost", json!({}))];
    let workflow = Workflow::new("wf", nodes, vec![]);

    let executor = validator_with(registry);
    assert!(executor.validate(&workflow).is_err());
}

#[test]
fn duplicate_node_id_is_rejected() {
    let registry = ExecutorRegistry::new();
    registry.register("mock", Arc::new(MockExecutor::returning("m", json!({})))).unwrap();

    let nodes = vec![NodeSpec::new("a", "mock", json!({})), NodeSpec::new("a", "mock", json!({}))];
    let workflow = Workflow::new("wf", nodes, vec![]);

    let executor = validator_with(registry);
    assert!(executor.validate(&workflow).is_err());
}
