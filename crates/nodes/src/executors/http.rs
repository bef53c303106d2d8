//! HTTP executor: issues a single request and normalizes the response.
//!
//! Contract (spec §4.D): `method`/`url` required; `headers`/`body` optional;
//! `response_type` controls binary detection; `ignore_status_errors` /
//! `success_status_codes` control whether a non-2xx status becomes an error.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Map, Value};

use crate::config::ConfigExt;
use crate::error::NodeError;
use crate::traits::{ExecutionContext, Executor};

const BINARY_CONTENT_TYPE_PREFIXES: &[&str] = &[
    "image/",
    "audio/",
    "video/",
    "application/octet-stream",
    "application/pdf",
    "application/zip",
    "application/gzip",
];

pub struct HttpExecutor {
    client: Client,
}

impl Default for HttpExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpExecutor {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .expect("reqwest client builds with default TLS config"),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Executor for HttpExecutor {
    async fn execute(
        &self,
        _ctx: &ExecutionContext,
        config: &Value,
        _input: &Value,
    ) -> Result<Value, NodeError> {
        let method = parse_method(&config.require_str("method")?)?;
        let url = config.require_str("url")?;

        let mut builder = self.client.request(method, &url);

        if let Some(headers) = config.get_map("headers") {
            for (key, value) in headers {
                if let Some(v) = value.as_str() {
                    builder = builder.header(key.as_str(), v);
                }
            }
        }

        if let Some(body) = config.get("body") {
            builder = match body {
                Value::String(s) => builder.body(s.clone()),
                Value::Null => builder,
                other => builder.header("content-type", "application/json").json(other),
            };
        }

        let response = builder
            .send()
            .await
            .map_err(|e| NodeError::Retryable(format!("http request failed: {e}")))?;

        let status = response.status();
        let success_codes = config.get("success_status_codes").and_then(Value::as_array);
        let ignore_status_errors = config.get_bool("ignore_status_errors", false);

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let response_type = config.get_str("response_type", "auto");
        let is_binary = response_type == "binary"
            || BINARY_CONTENT_TYPE_PREFIXES
                .iter()
                .any(|prefix| content_type.starts_with(prefix));

        let headers_json: Map<String, Value> = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    json!(v.to_str().unwrap_or_default()),
                )
            })
            .collect();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| NodeError::Retryable(format!("failed reading http response body: {e}")))?;

        let status_is_error = if let Some(codes) = success_codes {
            !codes.iter().any(|c| c.as_i64() == Some(status.as_u16() as i64))
        } else {
            status.as_u16() >= 400
        };

        let mut out = Map::new();
        out.insert("status".into(), json!(status.as_u16()));
        out.insert("headers".into(), Value::Object(headers_json));
        out.insert("content_type".into(), json!(content_type));

        if is_binary {
            use base64::Engine;
            out.insert(
                "body_base64".into(),
                json!(base64::engine::general_purpose::STANDARD.encode(&bytes)),
            );
            out.insert("size".into(), json!(bytes.len()));
        } else {
            let text = String::from_utf8_lossy(&bytes).to_string();
            let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
            out.insert("body".into(), body);
        }

        if status_is_error {
            out.insert("is_error".into(), json!(true));
            if !ignore_status_errors {
                return Err(NodeError::Retryable(format!(
                    "http request to '{url}' returned status {status}"
                )));
            }
        } else {
            out.insert("is_error".into(), json!(false));
        }

        Ok(Value::Object(out))
    }

    fn validate(&self, config: &Value) -> Result<(), NodeError> {
        let method = config.require_str("method")?;
        parse_method(&method)?;
        config.require_str("url")?;
        Ok(())
    }
}

fn parse_method(method: &str) -> Result<Method, NodeError> {
    match method.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "DELETE" => Ok(Method::DELETE),
        "PATCH" => Ok(Method::PATCH),
        "HEAD" => Ok(Method::HEAD),
        "OPTIONS" => Ok(Method::OPTIONS),
        other => Err(NodeError::Fatal(format!("unsupported http method '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> ExecutionContext {
        ExecutionContext {
            workflow_id: uuid::Uuid::new_v4(),
            execution_id: uuid::Uuid::new_v4(),
            node_id: "n1".into(),
            cancellation: CancellationToken::new(),
        }
    }

    #[test]
    fn validate_requires_method_and_url() {
        let exec = HttpExecutor::new();
        assert!(exec.validate(&json!({"method": "GET"})).is_err());
        assert!(exec
            .validate(&json!({"method": "GET", "url": "https://example.com"}))
            .is_ok());
    }

    #[test]
    fn validate_rejects_unknown_method() {
        let exec = HttpExecutor::new();
        assert!(exec
            .validate(&json!({"method": "TRACE", "url": "https://example.com"}))
            .is_err());
    }

    #[tokio::test]
    async fn get_against_unroutable_host_is_retryable() {
        let exec = HttpExecutor::new();
        let err = exec
            .execute(
                &ctx(),
                &json!({"method": "GET", "url": "http://127.0.0.1:1"}),
                &json!({}),
            )
            .await
            .unwrap_err();
        assert!(err.is_retry_eligible());
    }

    #[tokio::test]
    async fn success_status_codes_override_rejects_status_outside_the_list() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/created"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let exec = HttpExecutor::new();
        let url = format!("{}/created", server.uri());

        // 201 is not in the allow-list, so the override must fail the node
        // even though 201 is not a default-rule error status.
        let err = exec
            .execute(
                &ctx(),
                &json!({
                    "method": "GET",
                    "url": url,
                    "success_status_codes": [200],
                }),
                &json!({}),
            )
            .await
            .unwrap_err();
        assert!(err.is_retry_eligible());

        // The same response with ignore_status_errors passes through as data.
        let out = exec
            .execute(
                &ctx(),
                &json!({
                    "method": "GET",
                    "url": url,
                    "success_status_codes": [200],
                    "ignore_status_errors": true,
                }),
                &json!({}),
            )
            .await
            .unwrap();
        assert_eq!(out["is_error"], json!(true));
        assert_eq!(out["status"], json!(201));
    }
}
