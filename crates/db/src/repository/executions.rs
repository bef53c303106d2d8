//! Execution and node-execution repository functions.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    models::{NodeExecutionRow, WorkflowExecutionRow},
    DbError,
};

// ---------------------------------------------------------------------------
// workflow_executions
// ---------------------------------------------------------------------------

/// Create a new workflow execution record in `pending` status.
pub async fn create_execution(pool: &PgPool, workflow_id: Uuid) -> Result<WorkflowExecutionRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let row = sqlx::query_as!(
        WorkflowExecutionRow,
        r#"
        INSERT INTO workflow_executions (id, workflow_id, status, started_at)
        VALUES ($1, $2, 'pending', $3)
        RETURNING id, workflow_id, status, started_at, finished_at
        "#,
        id,
        workflow_id,
        now,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch a single execution by its primary key.
pub async fn get_execution(pool: &PgPool, id: Uuid) -> Result<WorkflowExecutionRow, DbError> {
    let row = sqlx::query_as!(
        WorkflowExecutionRow,
        r#"SELECT id, workflow_id, status, started_at, finished_at FROM workflow_executions WHERE id = $1"#,
        id,
    )
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Update the `status` (and optionally `finished_at`) of a workflow execution.
///
/// `status` must be one of `pending`/`running`/`succeeded`/`failed`/
/// `canceled`/`partial` — see `models::ExecutionStatus`.
pub async fn update_execution_status(
    pool: &PgPool,
    execution_id: Uuid,
    status: &str,
    finished: bool,
) -> Result<(), DbError> {
    if finished {
        sqlx::query!(
            r#"
            UPDATE workflow_executions
            SET status = $1, finished_at = $2
            WHERE id = $3
            "#,
            status,
            Utc::now(),
            execution_id,
        )
        .execute(pool)
        .await?;
    } else {
        sqlx::query!(
            r#"UPDATE workflow_executions SET status = $1 WHERE id = $2"#,
            status,
            execution_id,
        )
        .execute(pool)
        .await?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// node_executions
// ---------------------------------------------------------------------------

/// Upsert a node execution record — one row per (execution_id, node_id),
/// overwritten as the node progresses to its terminal status. Matches the
/// scheduler's "write a NodeExecution upon terminal transition" contract;
/// duplicate writes for the same node are harmless.
#[allow(clippy::too_many_arguments)]
pub async fn upsert_node_execution(
    pool: &PgPool,
    execution_id: Uuid,
    node_id: &str,
    node_name: &str,
    input: serde_json::Value,
    output: Option<serde_json::Value>,
    status: &str,
    error: &str,
    started_at: chrono::DateTime<Utc>,
    finished_at: Option<chrono::DateTime<Utc>>,
) -> Result<NodeExecutionRow, DbError> {
    let row = sqlx::query_as!(
        NodeExecutionRow,
        r#"
        INSERT INTO node_executions
            (id, execution_id, node_id, node_name, input, output, status, error, started_at, finished_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (execution_id, node_id) DO UPDATE SET
            output = EXCLUDED.output,
            status = EXCLUDED.status,
            error = EXCLUDED.error,
            finished_at = EXCLUDED.finished_at
        RETURNING id, execution_id, node_id, node_name, input, output, status, error, started_at, finished_at
        "#,
        Uuid::new_v4(),
        execution_id,
        node_id,
        node_name,
        input,
        output,
        status,
        error,
        started_at,
        finished_at,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Return every node execution recorded for `execution_id`.
pub async fn list_node_executions(pool: &PgPool, execution_id: Uuid) -> Result<Vec<NodeExecutionRow>, DbError> {
    let rows = sqlx::query_as!(
        NodeExecutionRow,
        r#"
        SELECT id, execution_id, node_id, node_name, input, output, status, error, started_at, finished_at
        FROM node_executions WHERE execution_id = $1
        "#,
        execution_id,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetch a single node's execution record within an execution.
pub async fn get_node_execution(pool: &PgPool, execution_id: Uuid, node_id: &str) -> Result<NodeExecutionRow, DbError> {
    let row = sqlx::query_as!(
        NodeExecutionRow,
        r#"
        SELECT id, execution_id, node_id, node_name, input, output, status, error, started_at, finished_at
        FROM node_executions WHERE execution_id = $1 AND node_id = $2
        "#,
        execution_id,
        node_id,
    )
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}
