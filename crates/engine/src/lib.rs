//! `engine` crate — core domain models, DAG validation, and the execution
//! engine (node dispatcher + graph scheduler).

pub mod dag;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod models;
pub mod scheduler;

pub use dag::{validate_dag, validate_executors};
pub use dispatcher::{DispatcherConfig, NodeDispatcher};
pub use error::EngineError;
pub use executor::{ExecutorConfig, WorkflowExecutor};
pub use models::{EdgeSpec, Execution, ExecutionStatus, NodeExecution, NodeSpec, NodeStatus, Trigger, Workflow};
pub use scheduler::GraphScheduler;

#[cfg(test)]
mod executor_tests;
