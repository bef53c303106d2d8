//! Background worker: polls `job_queue` and runs each job's workflow to
//! completion via [`engine::WorkflowExecutor`].
//!
//! One worker processes jobs serially — concurrency comes from running
//! multiple worker processes against the same table, each claiming rows via
//! `fetch_next_job`'s `FOR UPDATE SKIP LOCKED` (see `db::repository::jobs`).

use std::sync::Arc;
use std::time::Duration;

use serde_json::Map;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use db::{models::JobRow, DbPool};
use engine::{Workflow, WorkflowExecutor};

use crate::error::QueueError;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How long to sleep after finding no pending job before polling again.
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { poll_interval: Duration::from_secs(1) }
    }
}

pub struct Worker {
    pool: DbPool,
    executor: Arc<WorkflowExecutor>,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(pool: DbPool, executor: Arc<WorkflowExecutor>, config: WorkerConfig) -> Self {
        Self { pool, executor, config }
    }

    /// Poll until `shutdown` is triggered. Each iteration claims at most one
    /// job; a quiet queue falls back to sleeping `poll_interval` between
    /// polls instead of hammering the table.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("worker started");
        loop {
            if shutdown.is_cancelled() {
                break;
            }

            match db::repository::jobs::fetch_next_job(&self.pool).await {
                Ok(Some(job)) => {
                    self.process_job(job).await;
                }
                Ok(None) => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                        _ = shutdown.cancelled() => break,
                    }
                }
                Err(e) => {
                    error!("failed to poll job queue: {e}");
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                        _ = shutdown.cancelled() => break,
                    }
                }
            }
        }
        info!("worker stopped");
    }

    #[instrument(skip(self, job), fields(job_id = %job.id, execution_id = %job.execution_id))]
    async fn process_job(&self, job: JobRow) {
        match self.run_job(&job).await {
            Ok(()) => {
                if let Err(e) = db::repository::jobs::complete_job(&self.pool, job.id).await {
                    error!("failed to mark job {} completed: {e}", job.id);
                }
            }
            Err(e) => {
                warn!("job {} failed: {e}", job.id);
                if let Err(e) = db::repository::jobs::fail_job(&self.pool, job.id, job.max_attempts).await {
                    error!("failed to mark job {} failed: {e}", job.id);
                }
            }
        }
    }

    async fn run_job(&self, job: &JobRow) -> Result<(), QueueError> {
        let workflow_row = db::repository::workflows::get_workflow(&self.pool, job.workflow_id).await?;
        let workflow: Workflow = serde_json::from_value(workflow_row.definition)?;

        let execution = self
            .executor
            .execute(&workflow, job.execution_id, job.payload.clone(), Map::new())
            .await?;

        info!(status = ?execution.status, "workflow execution finished");
        Ok(())
    }
}

