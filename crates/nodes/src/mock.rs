//! Test double implementing [`Executor`], used across this crate's and the
//! engine crate's unit tests. Not compiled into release builds.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::NodeError;
use crate::traits::{ExecutionContext, Executor};

#[derive(Clone)]
enum MockBehavior {
    Return(Value),
    EchoConfig,
    EchoInput,
    Retryable(String),
    Fatal(String),
}

/// A configurable stand-in executor: either returns a canned value, echoes
/// back its `config`/`input`, or fails in a chosen way. Records every `input`
/// it was invoked with so tests can assert on call count and arguments.
pub struct MockExecutor {
    name: String,
    behavior: MockBehavior,
    calls: Arc<Mutex<Vec<Value>>>,
}

impl MockExecutor {
    pub fn returning(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            behavior: MockBehavior::Return(value),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn echo_config() -> Self {
        Self {
            name: "echo_config".into(),
            behavior: MockBehavior::EchoConfig,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn echo_input() -> Self {
        Self {
            name: "echo_input".into(),
            behavior: MockBehavior::EchoInput,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing_retryable(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behavior: MockBehavior::Retryable(message.into()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing_fatal(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behavior: MockBehavior::Fatal(message.into()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("mock call log poisoned").len()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn execute(
        &self,
        _ctx: &ExecutionContext,
        config: &Value,
        input: &Value,
    ) -> Result<Value, NodeError> {
        self.calls
            .lock()
            .expect("mock call log poisoned")
            .push(input.clone());

        match &self.behavior {
            MockBehavior::Return(v) => Ok(v.clone()),
            MockBehavior::EchoConfig => Ok(config.clone()),
            MockBehavior::EchoInput => Ok(input.clone()),
            MockBehavior::Retryable(msg) => Err(NodeError::Retryable(msg.clone())),
            MockBehavior::Fatal(msg) => Err(NodeError::Fatal(msg.clone())),
        }
    }

    fn validate(&self, _config: &Value) -> Result<(), NodeError> {
        Ok(())
    }
}
