//! Transform executor: `passthrough` | `template` | `expression` | `jq`.

use async_trait::async_trait;
use evalexpr::{Context as _, ContextWithMutableVariables, HashMapContext};
use jaq_interpret::{Ctx, FilterT, ParseCtx, RcIter, Val};
use serde_json::{Map, Value};

use crate::config::ConfigExt;
use crate::error::NodeError;
use crate::traits::{ExecutionContext, Executor};
use template::path;

#[derive(Default)]
pub struct TransformExecutor;

#[async_trait]
impl Executor for TransformExecutor {
    async fn execute(
        &self,
        _ctx: &ExecutionContext,
        config: &Value,
        input: &Value,
    ) -> Result<Value, NodeError> {
        match config.get_str("type", "passthrough").as_str() {
            "passthrough" => Ok(input.clone()),
            "template" => Ok(config.get("template").cloned().unwrap_or(Value::Null)),
            "expression" => eval_expression(&config.require_str("expression")?, input),
            "jq" => eval_jq(&config.require_str("filter")?, input),
            other => Err(NodeError::Fatal(format!("unknown transform type '{other}'"))),
        }
    }

    fn validate(&self, config: &Value) -> Result<(), NodeError> {
        match config.get_str("type", "passthrough").as_str() {
            "passthrough" | "template" => Ok(()),
            "expression" => {
                config.require_str("expression")?;
                Ok(())
            }
            "jq" => {
                config.require_str("filter")?;
                Ok(())
            }
            other => Err(NodeError::Fatal(format!("unknown transform type '{other}'"))),
        }
    }
}

/// Evaluate a small expression language over `{input: <input>}`.
///
/// `evalexpr`'s identifiers can't contain dots, so `input.foo.bar` reads as
/// three tokens to its tokenizer. We pre-scan the expression text for
/// `input`-rooted paths (reusing the template crate's path grammar — the
/// same dotted/bracketed syntax placeholders use), substitute each with a
/// synthesized identifier, and bind that identifier to the navigated value.
fn eval_expression(expr: &str, input: &Value) -> Result<Value, NodeError> {
    let (rewritten, context) = rewrite_input_paths(expr, input)?;
    let result = evalexpr::eval_with_context(&rewritten, &context)
        .map_err(|e| NodeError::Fatal(format!("expression error: {e}")))?;
    evalexpr_to_json(result)
}

pub(crate) fn rewrite_input_paths(
    expr: &str,
    input: &Value,
) -> Result<(String, HashMapContext), NodeError> {
    let mut context = HashMapContext::new();
    let mut out = String::with_capacity(expr.len());
    let bytes = expr.as_bytes();
    let mut i = 0;
    let mut next_var = 0usize;

    while i < bytes.len() {
        if expr[i..].starts_with("input") && is_path_boundary(&expr, i, i + "input".len()) {
            let start = i;
            let mut end = i + "input".len();
            while end < bytes.len() && matches!(bytes[end], b'.' | b'[') {
                end = consume_segment(expr, end);
            }
            let path_text = &expr[start + "input".len()..end];
            let segments = if path_text.is_empty() {
                Vec::new()
            } else {
                path::parse(path_text.trim_start_matches('.'))
                    .map_err(|e| NodeError::Fatal(format!("invalid expression path: {e}")))?
            };
            let value = path::navigate(input, &segments).cloned().unwrap_or(Value::Null);
            let var_name = format!("__inp{next_var}");
            next_var += 1;
            context
                .set_value(var_name.clone(), json_to_evalexpr(&value))
                .map_err(|e| NodeError::Fatal(format!("expression binding error: {e}")))?;
            out.push_str(&var_name);
            i = end;
        } else {
            out.push(bytes[i] as char);
            i += 1;
        }
    }

    Ok((out, context))
}

fn is_path_boundary(expr: &str, start: usize, end: usize) -> bool {
    let before_ok = start == 0
        || !expr[..start]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphanumeric() || c == '_');
    let after_ok = end >= expr.len()
        || !expr[end..]
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_');
    before_ok && after_ok
}

/// Consume one `.identifier` or `[...]` segment starting at `pos`, returning
/// the byte index just past it.
fn consume_segment(expr: &str, pos: usize) -> usize {
    let bytes = expr.as_bytes();
    if bytes[pos] == b'.' {
        let mut end = pos + 1;
        while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
            end += 1;
        }
        end
    } else {
        // bracket segment: advance to the matching ']'
        let mut end = pos + 1;
        while end < bytes.len() && bytes[end] != b']' {
            end += 1;
        }
        (end + 1).min(bytes.len())
    }
}

fn json_to_evalexpr(value: &Value) -> evalexpr::Value {
    match value {
        Value::Null => evalexpr::Value::Empty,
        Value::Bool(b) => evalexpr::Value::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                evalexpr::Value::Int(i)
            } else {
                evalexpr::Value::Float(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => evalexpr::Value::String(s.clone()),
        other => evalexpr::Value::String(other.to_string()),
    }
}

fn evalexpr_to_json(value: evalexpr::Value) -> Result<Value, NodeError> {
    Ok(match value {
        evalexpr::Value::String(s) => Value::String(s),
        evalexpr::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        evalexpr::Value::Int(i) => Value::Number(i.into()),
        evalexpr::Value::Boolean(b) => Value::Bool(b),
        evalexpr::Value::Tuple(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(evalexpr_to_json(item)?);
            }
            Value::Array(out)
        }
        evalexpr::Value::Empty => Value::Null,
    })
}

/// Run a jq filter over `input` via the pure-Rust `jaq` interpreter. String
/// and byte-shaped inputs are first tried as JSON, falling back to the raw
/// string — per spec §4.D. Only the filter's first produced value is
/// returned; a zero-output filter fails.
fn eval_jq(filter_src: &str, input: &Value) -> Result<Value, NodeError> {
    let effective_input = match input {
        Value::String(s) => serde_json::from_str::<Value>(s).unwrap_or_else(|_| input.clone()),
        other => other.clone(),
    };

    let (parsed, errs) = jaq_parse::parse(filter_src, jaq_parse::main());
    if !errs.is_empty() {
        return Err(NodeError::Fatal(format!(
            "jq filter parse error: {:?}",
            errs
        )));
    }
    let parsed = parsed.ok_or_else(|| NodeError::Fatal("empty jq filter".to_string()))?;

    let mut defs = ParseCtx::new(Vec::new());
    defs.insert_natives(jaq_std::std());
    let filter = defs.compile(parsed);
    if !defs.errs.is_empty() {
        return Err(NodeError::Fatal(format!(
            "jq filter compile error: {:?}",
            defs.errs
        )));
    }

    let inputs = RcIter::new(core::iter::empty());
    let val = json_to_val(&effective_input);
    let mut outputs = filter.run((Ctx::new([], &inputs), val));

    match outputs.next() {
        Some(Ok(first)) => Ok(val_to_json(&first)),
        Some(Err(e)) => Err(NodeError::Fatal(format!("jq runtime error: {e}"))),
        None => Err(NodeError::Fatal("jq filter produced no output".to_string())),
    }
}

/// Manual `serde_json::Value` <-> `jaq_interpret::Val` bridge (`jaq-json`'s
/// conversion impls aren't in our dependency set; `jaq-interpret` alone
/// doesn't implement `From<serde_json::Value>`).
fn json_to_val(value: &Value) -> Val {
    match value {
        Value::Null => Val::Null,
        Value::Bool(b) => Val::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Val::Int(i as isize)
            } else {
                Val::Float(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => Val::Str(std::rc::Rc::new(s.clone())),
        Value::Array(items) => Val::Arr(std::rc::Rc::new(items.iter().map(json_to_val).collect())),
        Value::Object(map) => {
            let mut out = indexmap::IndexMap::new();
            for (k, v) in map {
                out.insert(std::rc::Rc::new(k.clone()), json_to_val(v));
            }
            Val::Obj(std::rc::Rc::new(out))
        }
    }
}

fn val_to_json(val: &Val) -> Value {
    match val {
        Val::Null => Value::Null,
        Val::Bool(b) => Value::Bool(*b),
        Val::Int(i) => Value::Number((*i as i64).into()),
        Val::Float(f) => serde_json::Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        Val::Num(n) => serde_json::from_str(n).unwrap_or(Value::Null),
        Val::Str(s) => Value::String((**s).clone()),
        Val::Arr(items) => Value::Array(items.iter().map(val_to_json).collect()),
        Val::Obj(map) => {
            let mut out = Map::new();
            for (k, v) in map.iter() {
                out.insert((**k).clone(), val_to_json(v));
            }
            Value::Object(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
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
    async fn passthrough_returns_input_unchanged() {
        let exec = TransformExecutor;
        let input = json!({"a": 1});
        let out = exec
            .execute(&ctx(), &json!({"type": "passthrough"}), &input)
            .await
            .unwrap();
        assert_eq!(out, input);
    }

    #[tokio::test]
    async fn template_returns_already_resolved_value() {
        let exec = TransformExecutor;
        let out = exec
            .execute(
                &ctx(),
                &json!({"type": "template", "template": "resolved-value"}),
                &json!({}),
            )
            .await
            .unwrap();
        assert_eq!(out, json!("resolved-value"));
    }

    #[tokio::test]
    async fn expression_reads_nested_input_path() {
        let exec = TransformExecutor;
        let out = exec
            .execute(
                &ctx(),
                &json!({"type": "expression", "expression": "input.score >= 80"}),
                &json!({"score": 85}),
            )
            .await
            .unwrap();
        assert_eq!(out, json!(true));
    }

    #[tokio::test]
    async fn jq_multiplies_field() {
        let exec = TransformExecutor;
        let out = exec
            .execute(
                &ctx(),
                &json!({"type": "jq", "filter": ".n * 2"}),
                &json!({"n": 5}),
            )
            .await
            .unwrap();
        assert_eq!(out, json!(10));
    }

    #[tokio::test]
    async fn jq_zero_output_filter_fails() {
        let exec = TransformExecutor;
        let err = exec
            .execute(&ctx(), &json!({"type": "jq", "filter": "empty"}), &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Fatal(_)));
    }
}
