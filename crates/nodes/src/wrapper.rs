//! Template wrapper (component C): resolves `config` against a
//! [`template::TemplateEngine`] immediately before delegating to the
//! wrapped executor.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use template::{TemplateEngine, VariableContext};

use crate::error::NodeError;
use crate::traits::{ExecutionContext, Executor};

struct TemplateWrapper {
    inner: Arc<dyn Executor>,
    engine: TemplateEngine,
    var_ctx: VariableContext,
}

#[async_trait]
impl Executor for TemplateWrapper {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        config: &Value,
        input: &Value,
    ) -> Result<Value, NodeError> {
        let resolved = self.engine.resolve(&self.var_ctx, config)?;
        self.inner.execute(ctx, &resolved, input).await
    }

    fn validate(&self, config: &Value) -> Result<(), NodeError> {
        // Templates validate at execute time, not authoring time — delegate
        // directly without resolution.
        self.inner.validate(config)
    }
}

/// Wrap `inner` so its config is template-resolved against `var_ctx` before
/// every invocation. If `engine` is `None`, `inner` is returned untouched.
pub fn wrap(
    inner: Arc<dyn Executor>,
    engine: Option<TemplateEngine>,
    var_ctx: VariableContext,
) -> Arc<dyn Executor> {
    match engine {
        Some(engine) => Arc::new(TemplateWrapper {
            inner,
            engine,
            var_ctx,
        }),
        None => inner,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockExecutor;
    use serde_json::json;
    use template::TemplateOptions;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> ExecutionContext {
        ExecutionContext {
            workflow_id: uuid::Uuid::new_v4(),
            execution_id: uuid::Uuid::new_v4(),
            node_id: "n1".into(),
            cancellation: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn resolves_config_before_delegating() {
        let inner = Arc::new(MockExecutor::echo_config());
        let var_ctx = VariableContext::new(
            serde_json::Map::from_iter([("host".to_string(), json!("api.example.com"))]),
            serde_json::Map::new(),
            json!({}),
            serde_json::Map::new(),
        );
        let wrapped = wrap(
            inner,
            Some(TemplateEngine::new(TemplateOptions::default())),
            var_ctx,
        );

        let out = wrapped
            .execute(&ctx(), &json!({"url": "https://{{env.host}}/x"}), &json!({}))
            .await
            .unwrap();
        assert_eq!(out, json!({"url": "https://api.example.com/x"}));
    }

    #[tokio::test]
    async fn absent_engine_passes_config_through_untouched() {
        let inner = Arc::new(MockExecutor::echo_config());
        let wrapped = wrap(inner, None, VariableContext::default());

        let out = wrapped
            .execute(&ctx(), &json!({"url": "{{env.host}}"}), &json!({}))
            .await
            .unwrap();
        assert_eq!(out, json!({"url": "{{env.host}}"}));
    }
}
