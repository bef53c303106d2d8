//! Typed accessors over an untyped JSON config map, with defaults.
//!
//! Executor authors read their `config: &Value` back untyped (§4.B); these
//! helpers centralize the common coercions — in particular, JSON's single
//! numeric type means an integer field may arrive as `30` or `30.0`, and both
//! must coerce to `30` by truncation.

use serde_json::{Map, Value};

use crate::error::NodeError;

pub trait ConfigExt {
    fn get_str(&self, key: &str, default: &str) -> String;
    fn get_i64(&self, key: &str, default: i64) -> i64;
    fn get_f64(&self, key: &str, default: f64) -> f64;
    fn get_bool(&self, key: &str, default: bool) -> bool;
    fn get_map(&self, key: &str) -> Option<&Map<String, Value>>;
    fn get_string_list(&self, key: &str) -> Vec<String>;
    fn require_str(&self, key: &str) -> Result<String, NodeError>;
}

impl ConfigExt for Value {
    fn get_str(&self, key: &str, default: &str) -> String {
        self.get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| default.to_string())
    }

    fn get_i64(&self, key: &str, default: i64) -> i64 {
        match self.get(key) {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                .unwrap_or(default),
            _ => default,
        }
    }

    fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.get(key).and_then(Value::as_f64).unwrap_or(default)
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    fn get_map(&self, key: &str) -> Option<&Map<String, Value>> {
        self.get(key).and_then(Value::as_object)
    }

    fn get_string_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    }

    fn require_str(&self, key: &str) -> Result<String, NodeError> {
        self.get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| NodeError::Fatal(format!("missing required config field '{key}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_field_coerces_from_json_float() {
        let config = json!({"timeout": 30.0});
        assert_eq!(config.get_i64("timeout", 0), 30);
    }

    #[test]
    fn missing_field_uses_default() {
        let config = json!({});
        assert_eq!(config.get_str("url", "http://default"), "http://default");
    }

    #[test]
    fn require_str_errors_on_missing() {
        let config = json!({});
        assert!(config.require_str("url").is_err());
    }
}
