//! `queue` crate — the background job worker that drains `job_queue` and
//! drives each job's workflow through [`engine::WorkflowExecutor`].
//!
//! The API layer enqueues jobs (`db::repository::jobs::enqueue_job`); this
//! crate is the consumer side.

pub mod error;
pub mod worker;

pub use error::QueueError;
pub use worker::{Worker, WorkerConfig};
