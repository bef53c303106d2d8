//! `LlmProviderBackend` — the per-vendor wire-format boundary (§6, §9). The
//! core never names a concrete vendor; a real process registers one backend
//! per `provider` tag at startup. [`MockProviderBackend`] is the scripted
//! test double used across the tool-calling-loop tests (spec §8 scenario 6).

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::NodeError;

use super::types::{LlmRequest, LlmResponse};

#[async_trait]
pub trait LlmProviderBackend: Send + Sync {
    async fn execute(&self, request: LlmRequest) -> Result<LlmResponse, NodeError>;
}

/// A provider backend that plays back a fixed script of responses, one per
/// call, in order. Panics (via an internal error) if called more times than
/// scripted — tests size the script to the expected iteration count.
pub struct MockProviderBackend {
    responses: Mutex<Vec<LlmResponse>>,
    calls: Mutex<Vec<LlmRequest>>,
}

impl MockProviderBackend {
    pub fn scripted(responses: Vec<LlmResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().rev().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("mock provider lock poisoned").len()
    }
}

#[async_trait]
impl LlmProviderBackend for MockProviderBackend {
    async fn execute(&self, request: LlmRequest) -> Result<LlmResponse, NodeError> {
        self.calls
            .lock()
            .expect("mock provider lock poisoned")
            .push(request);
        self.responses
            .lock()
            .expect("mock provider lock poisoned")
            .pop()
            .ok_or_else(|| NodeError::Fatal("mock provider script exhausted".to_string()))
    }
}
