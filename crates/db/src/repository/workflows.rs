//! Workflow CRUD operations.
//!
//! `workflows.definition` remains the source of truth the `engine::Workflow`
//! type deserializes from; `node_defs`/`edges` are a queryable projection of
//! the same nodes/edges, kept in sync inside the same transaction, so the API
//! can validate a workflow's shape without deserializing the whole blob.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    models::{EdgeRow, NodeDefRow, WorkflowRow},
    DbError,
};

/// A node/edge pair extracted from the domain `Workflow`, ready for the
/// projection tables. Kept deliberately untyped (no `engine` dependency in
/// this crate) — callers pass the fields they already have.
pub struct NodeDefInput<'a> {
    pub node_key: &'a str,
    pub node_type: &'a str,
    pub name: &'a str,
    pub config: serde_json::Value,
}

pub struct EdgeInput<'a> {
    pub edge_key: &'a str,
    pub from_node: &'a str,
    pub to_node: &'a str,
    pub condition: Option<&'a str>,
}

/// Insert a new workflow, its node/edge projection rows, all in one
/// transaction.
///
/// `definition` must be a valid JSON object produced by serialising the
/// domain `Workflow` type from the `engine` crate.
pub async fn create_workflow(
    pool: &PgPool,
    name: &str,
    definition: serde_json::Value,
    nodes: &[NodeDefInput<'_>],
    edges: &[EdgeInput<'_>],
) -> Result<WorkflowRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    let row = sqlx::query_as!(
        WorkflowRow,
        r#"
        INSERT INTO workflows (id, name, definition, created_at)
        VALUES ($1, $2, $3, $4)
        RETURNING id, name, definition, created_at
        "#,
        id,
        name,
        definition,
        now,
    )
    .fetch_one(&mut *tx)
    .await?;

    for node in nodes {
        sqlx::query!(
            r#"
            INSERT INTO node_defs (id, workflow_id, node_key, node_type, name, config)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
            Uuid::new_v4(),
            id,
            node.node_key,
            node.node_type,
            node.name,
            node.config,
        )
        .execute(&mut *tx)
        .await?;
    }

    for edge in edges {
        sqlx::query!(
            r#"
            INSERT INTO edges (id, workflow_id, edge_key, from_node, to_node, condition)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
            Uuid::new_v4(),
            id,
            edge.edge_key,
            edge.from_node,
            edge.to_node,
            edge.condition,
        )
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(row)
}

/// Fetch a single workflow by its primary key.
pub async fn get_workflow(pool: &PgPool, id: Uuid) -> Result<WorkflowRow, DbError> {
    let row = sqlx::query_as!(
        WorkflowRow,
        r#"SELECT id, name, definition, created_at FROM workflows WHERE id = $1"#,
        id,
    )
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Return all workflows ordered by creation time (newest first).
pub async fn list_workflows(pool: &PgPool) -> Result<Vec<WorkflowRow>, DbError> {
    let rows = sqlx::query_as!(
        WorkflowRow,
        r#"SELECT id, name, definition, created_at FROM workflows ORDER BY created_at DESC"#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Permanently delete a workflow by its primary key (cascades to its
/// `node_defs`/`edges` projection rows).
///
/// Returns `DbError::NotFound` if no row was deleted.
pub async fn delete_workflow(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query!("DELETE FROM workflows WHERE id = $1", id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Return the node/edge projection rows for a workflow — used by the
/// `validate` surface to check a graph's shape without loading `definition`.
pub async fn get_graph(pool: &PgPool, workflow_id: Uuid) -> Result<(Vec<NodeDefRow>, Vec<EdgeRow>), DbError> {
    let nodes = sqlx::query_as!(
        NodeDefRow,
        r#"SELECT id, workflow_id, node_key, node_type, name, config FROM node_defs WHERE workflow_id = $1"#,
        workflow_id,
    )
    .fetch_all(pool)
    .await?;

    let edges = sqlx::query_as!(
        EdgeRow,
        r#"SELECT id, workflow_id, edge_key, from_node, to_node, condition FROM edges WHERE workflow_id = $1"#,
        workflow_id,
    )
    .fetch_all(pool)
    .await?;

    Ok((nodes, edges))
}
