//! Thread-safe registry mapping `node_type` strings to shared executors.
//!
//! Reads (the hot path — one lookup per node dispatch) must not block each
//! other; writes (startup registration, occasional runtime registration) are
//! rare, so a plain reader/writer lock is the right tool.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::NodeError;
use crate::traits::Executor;

#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    inner: Arc<RwLock<HashMap<String, Arc<dyn Executor>>>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `executor` under `node_type`. An empty `node_type` is rejected.
    pub fn register(
        &self,
        node_type: impl Into<String>,
        executor: Arc<dyn Executor>,
    ) -> Result<(), NodeError> {
        let node_type = node_type.into();
        if node_type.is_empty() {
            return Err(NodeError::Fatal("invalid argument: empty node type".into()));
        }
        self.inner
            .write()
            .expect("executor registry lock poisoned")
            .insert(node_type, executor);
        Ok(())
    }

    pub fn unregister(&self, node_type: &str) {
        self.inner
            .write()
            .expect("executor registry lock poisoned")
            .remove(node_type);
    }

    pub fn get(&self, node_type: &str) -> Result<Arc<dyn Executor>, NodeError> {
        self.inner
            .read()
            .expect("executor registry lock poisoned")
            .get(node_type)
            .cloned()
            .ok_or_else(|| NodeError::ExecutorNotFound(node_type.to_string()))
    }

    pub fn has(&self, node_type: &str) -> bool {
        self.inner
            .read()
            .expect("executor registry lock poisoned")
            .contains_key(node_type)
    }

    pub fn list(&self) -> Vec<String> {
        self.inner
            .read()
            .expect("executor registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockExecutor;
    use serde_json::json;

    #[test]
    fn register_then_get_round_trips() {
        let registry = ExecutorRegistry::new();
        registry
            .register("mock", Arc::new(MockExecutor::returning("m", json!({}))))
            .unwrap();
        assert!(registry.has("mock"));
        assert!(registry.get("mock").is_ok());
    }

    #[test]
    fn get_missing_returns_executor_not_found() {
        let registry = ExecutorRegistry::new();
        assert!(matches!(
            registry.get("ghost"),
            Err(NodeError::ExecutorNotFound(t)) if t == "ghost"
        ));
    }

    #[test]
    fn unregister_removes_entry() {
        let registry = ExecutorRegistry::new();
        registry
            .register("mock", Arc::new(MockExecutor::returning("m", json!({}))))
            .unwrap();
        registry.unregister("mock");
        assert!(matches!(registry.get("mock"), Err(NodeError::ExecutorNotFound(_))));
    }

    #[test]
    fn empty_node_type_is_rejected() {
        let registry = ExecutorRegistry::new();
        let err = registry
            .register("", Arc::new(MockExecutor::returning("m", json!({}))))
            .unwrap_err();
        assert!(matches!(err, NodeError::Fatal(_)));
    }

    #[test]
    fn list_reflects_registered_types() {
        let registry = ExecutorRegistry::new();
        registry
            .register("a", Arc::new(MockExecutor::returning("a", json!({}))))
            .unwrap();
        registry
            .register("b", Arc::new(MockExecutor::returning("b", json!({}))))
            .unwrap();
        let mut list = registry.list();
        list.sort();
        assert_eq!(list, vec!["a".to_string(), "b".to_string()]);
    }
}
