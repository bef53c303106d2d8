//! Typed error type for the queue crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("database error: {0}")]
    Database(#[from] db::DbError),

    #[error("engine error: {0}")]
    Engine(#[from] engine::EngineError),

    #[error("job payload is not a valid workflow definition: {0}")]
    InvalidDefinition(#[from] serde_json::Error),
}
