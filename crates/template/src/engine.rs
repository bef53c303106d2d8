//! Placeholder resolution: `{{scope.path}}` inside strings, recursively
//! across maps and lists, producing a fully resolved copy without mutating
//! the input.

use serde_json::{Map, Value};

use crate::context::VariableContext;
use crate::error::TemplateError;
use crate::path::{self, Segment};

/// Tuning knobs for [`TemplateEngine`], named directly after the
/// configuration options in the spec (`strict_mode`, `placeholder_on_missing`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateOptions {
    /// In strict mode, a missing variable fails the whole resolution.
    pub strict_mode: bool,
    /// In lenient mode, controls whether a missing placeholder is rendered
    /// as an empty string (`false`) or echoed back literally (`true`).
    pub placeholder_on_missing: bool,
}

/// Resolves `{{scope.path}}` placeholders against a [`VariableContext`].
///
/// Immutable after construction; safe for concurrent reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateEngine {
    options: TemplateOptions,
}

impl TemplateEngine {
    pub fn new(options: TemplateOptions) -> Self {
        Self { options }
    }

    /// Resolve every placeholder in `value`, recursively. The output has the
    /// same shape as the input, with strings possibly replaced by native
    /// (non-string) values when a placeholder is the entire string.
    pub fn resolve(&self, ctx: &VariableContext, value: &Value) -> Result<Value, TemplateError> {
        match value {
            Value::String(s) => self.resolve_string(ctx, s),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.resolve(ctx, item)?);
                }
                Ok(Value::Array(out))
            }
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), self.resolve(ctx, v)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn resolve_string(&self, ctx: &VariableContext, s: &str) -> Result<Value, TemplateError> {
        let matches = find_placeholders(s);
        if matches.is_empty() {
            return Ok(Value::String(s.to_string()));
        }

        if let Some((_, _, raw_inner)) = whole_string_placeholder(s, &matches) {
            let inner = raw_inner.trim();
            return match self.resolve_placeholder(ctx, inner)? {
                Some(v) => Ok(v),
                None => self.missing_value(inner),
            };
        }

        let mut out = String::with_capacity(s.len());
        let mut last = 0;
        for (start, end, raw_inner) in matches {
            out.push_str(&s[last..start]);
            let inner = raw_inner.trim();
            match self.resolve_placeholder(ctx, inner)? {
                Some(v) => out.push_str(&render_inline(&v)),
                None => match self.missing_value(inner)? {
                    Value::String(s) => out.push_str(&s),
                    other => out.push_str(&render_inline(&other)),
                },
            }
            last = end;
        }
        out.push_str(&s[last..]);
        Ok(Value::String(out))
    }

    fn missing_value(&self, inner: &str) -> Result<Value, TemplateError> {
        if self.options.strict_mode {
            Err(TemplateError::MissingPlaceholder(inner.to_string()))
        } else if self.options.placeholder_on_missing {
            Ok(Value::String(format!("{{{{{inner}}}}}")))
        } else {
            Ok(Value::String(String::new()))
        }
    }

    /// Resolve a single placeholder's inner text (without the surrounding
    /// `{{ }}`) to `Some(value)`, or `None` if it's missing — syntax errors
    /// in the path itself always fail, regardless of strict/lenient mode.
    fn resolve_placeholder(
        &self,
        ctx: &VariableContext,
        inner: &str,
    ) -> Result<Option<Value>, TemplateError> {
        let segments = path::parse(inner)?;
        let (scope, rest) = segments
            .split_first()
            .ok_or_else(|| TemplateError::InvalidPath(inner.to_string()))?;
        let scope_name = match scope {
            Segment::Key(k) => k.as_str(),
            Segment::Index(_) => return Err(TemplateError::InvalidPath(inner.to_string())),
        };

        match scope_name {
            "env" => {
                let (name_seg, sub) = rest
                    .split_first()
                    .ok_or_else(|| TemplateError::InvalidPath(inner.to_string()))?;
                let name = key_str(name_seg, inner)?;
                let base = ctx.execution.get(name).or_else(|| ctx.workflow.get(name));
                Ok(base.and_then(|v| path::navigate(v, sub)).cloned())
            }
            "input" => Ok(path::navigate(&ctx.input, rest).cloned()),
            "resource" => {
                let (name_seg, sub) = rest
                    .split_first()
                    .ok_or_else(|| TemplateError::InvalidPath(inner.to_string()))?;
                let name = key_str(name_seg, inner)?;
                Ok(ctx.resource.get(name).and_then(|v| path::navigate(v, sub)).cloned())
            }
            other => Err(TemplateError::UnknownScope(other.to_string())),
        }
    }
}

fn key_str<'a>(segment: &'a Segment, inner: &str) -> Result<&'a str, TemplateError> {
    match segment {
        Segment::Key(k) => Ok(k.as_str()),
        Segment::Index(_) => Err(TemplateError::InvalidPath(inner.to_string())),
    }
}

/// Canonical textual form used when a resolved value is interpolated
/// mid-string (as opposed to replacing the whole string slot).
fn render_inline(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Find every `{{ ... }}` span in `s`. Returns `(start_byte, end_byte, raw_inner)`
/// triples in order; braces don't nest so a simple forward scan suffices.
fn find_placeholders(s: &str) -> Vec<(usize, usize, &str)> {
    let mut out = Vec::new();
    let bytes = s.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'{' && bytes[i + 1] == b'{' {
            if let Some(close) = s[i + 2..].find("}}") {
                let inner_start = i + 2;
                let inner_end = inner_start + close;
                let full_end = inner_end + 2;
                out.push((i, full_end, &s[inner_start..inner_end]));
                i = full_end;
                continue;
            }
        }
        i += 1;
    }
    out
}

/// If `s`, once surrounding whitespace is trimmed, is exactly one
/// placeholder (no literal text around it), return that match.
fn whole_string_placeholder<'a>(
    s: &'a str,
    matches: &[(usize, usize, &'a str)],
) -> Option<(usize, usize, &'a str)> {
    if matches.len() != 1 {
        return None;
    }
    let (start, end, inner) = matches[0];
    let leading_ws = s.len() - s.trim_start().len();
    let trailing_ws = s.len() - s.trim_end().len();
    if start == leading_ws && end == s.len() - trailing_ws {
        Some((start, end, inner))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> VariableContext {
        VariableContext::new(
            serde_json::Map::from_iter([
                ("apiKey".to_string(), json!("w-key")),
                ("timeout".to_string(), json!(30)),
            ]),
            serde_json::Map::from_iter([("apiKey".to_string(), json!("e-key"))]),
            json!({"userId": "u-1"}),
            serde_json::Map::from_iter([(
                "db".to_string(),
                json!({"host": "10.0.0.1", "port": 5432}),
            )]),
        )
    }

    #[test]
    fn execution_overrides_precede_workflow_variables() {
        let engine = TemplateEngine::new(TemplateOptions::default());
        let resolved = engine.resolve(&ctx(), &json!("{{env.apiKey}}")).unwrap();
        assert_eq!(resolved, json!("e-key"));
    }

    #[test]
    fn whole_string_placeholder_preserves_native_type() {
        let engine = TemplateEngine::new(TemplateOptions::default());
        let resolved = engine.resolve(&ctx(), &json!("{{env.timeout}}")).unwrap();
        assert_eq!(resolved, json!(30));
    }

    #[test]
    fn mid_string_placeholder_renders_canonical_text() {
        let engine = TemplateEngine::new(TemplateOptions::default());
        let resolved = engine
            .resolve(&ctx(), &json!("timeout is {{env.timeout}}s"))
            .unwrap();
        assert_eq!(resolved, json!("timeout is 30s"));
    }

    #[test]
    fn input_scope_reads_current_dispatch_input_only() {
        let engine = TemplateEngine::new(TemplateOptions::default());
        let resolved = engine.resolve(&ctx(), &json!("{{input.userId}}")).unwrap();
        assert_eq!(resolved, json!("u-1"));
    }

    #[test]
    fn resource_scope_navigates_nested_fields() {
        let engine = TemplateEngine::new(TemplateOptions::default());
        let resolved = engine
            .resolve(&ctx(), &json!("{{resource.db.host}}"))
            .unwrap();
        assert_eq!(resolved, json!("10.0.0.1"));
    }

    #[test]
    fn strict_mode_fails_on_missing_placeholder() {
        let engine = TemplateEngine::new(TemplateOptions {
            strict_mode: true,
            placeholder_on_missing: false,
        });
        let err = engine.resolve(&ctx(), &json!("{{env.host}}")).unwrap_err();
        assert_eq!(err, TemplateError::MissingPlaceholder("env.host".into()));
    }

    #[test]
    fn lenient_mode_empty_substitution_by_default() {
        let engine = TemplateEngine::new(TemplateOptions::default());
        let resolved = engine
            .resolve(&ctx(), &json!("{{env.host}}/{{input.userId}}"))
            .unwrap();
        assert_eq!(resolved, json!("/u-1"));
    }

    #[test]
    fn lenient_mode_placeholder_echo_when_enabled() {
        let engine = TemplateEngine::new(TemplateOptions {
            strict_mode: false,
            placeholder_on_missing: true,
        });
        let resolved = engine.resolve(&ctx(), &json!("{{env.host}}")).unwrap();
        assert_eq!(resolved, json!("{{env.host}}"));
    }

    #[test]
    fn idempotent_on_config_with_no_placeholders() {
        let engine = TemplateEngine::new(TemplateOptions::default());
        let input = json!({"a": [1, 2, {"b": "plain"}], "c": true});
        let resolved = engine.resolve(&ctx(), &input).unwrap();
        assert_eq!(resolved, input);
    }

    #[test]
    fn resolves_recursively_through_nested_config() {
        let engine = TemplateEngine::new(TemplateOptions::default());
        let input = json!({
            "url": "{{env.apiKey}}/users/{{input.userId}}",
            "nested": {"timeout": "{{env.timeout}}"},
            "list": ["{{input.userId}}", "literal"],
        });
        let resolved = engine.resolve(&ctx(), &input).unwrap();
        assert_eq!(
            resolved,
            json!({
                "url": "e-key/users/u-1",
                "nested": {"timeout": 30},
                "list": ["u-1", "literal"],
            })
        );
    }
}
