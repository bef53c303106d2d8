//! File-storage executor: `action` in {`store`,`get`,`delete`,`list`,
//! `metadata`} (§4.D), backed by a pluggable [`FileStorageBackend`]. Only an
//! in-memory reference backend ships here — real backends (S3, disk, GCS)
//! are out of scope per the spec's framing of individual adapters.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::ConfigExt;
use crate::error::NodeError;
use crate::traits::{ExecutionContext, Executor};

/// Access scope recorded alongside a stored file, used by `list` filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessScope {
    Workflow,
    Edge,
    Result,
}

impl AccessScope {
    fn parse(s: &str) -> Result<Self, NodeError> {
        match s {
            "workflow" => Ok(Self::Workflow),
            "edge" => Ok(Self::Edge),
            "result" => Ok(Self::Result),
            other => Err(NodeError::Fatal(format!("unknown file access scope '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: Uuid,
    pub filename: String,
    pub mime_type: String,
    pub size: usize,
    pub access_scope: AccessScope,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// External collaborator (§6): store/get/delete/list/metadata/usage/exists
/// over binary payloads, scoped by [`FileEntry`] metadata.
#[async_trait]
pub trait FileStorageBackend: Send + Sync {
    async fn store(&self, entry: FileEntry, data: Vec<u8>) -> Result<FileEntry, NodeError>;
    async fn get(&self, id: Uuid) -> Result<(FileEntry, Vec<u8>), NodeError>;
    async fn delete(&self, id: Uuid) -> Result<(), NodeError>;
    async fn list(&self, scope: Option<AccessScope>, tags: &[String], limit: usize) -> Result<Vec<FileEntry>, NodeError>;
    async fn get_metadata(&self, id: Uuid) -> Result<FileEntry, NodeError>;
    async fn get_usage(&self) -> Result<u64, NodeError>;
    async fn exists(&self, id: Uuid) -> Result<bool, NodeError>;
}

#[derive(Default)]
pub struct InMemoryFileStorage {
    files: RwLock<HashMap<Uuid, (FileEntry, Vec<u8>)>>,
}

impl InMemoryFileStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileStorageBackend for InMemoryFileStorage {
    async fn store(&self, entry: FileEntry, data: Vec<u8>) -> Result<FileEntry, NodeError> {
        let mut files = self.files.write().await;
        files.insert(entry.id, (entry.clone(), data));
        Ok(entry)
    }

    async fn get(&self, id: Uuid) -> Result<(FileEntry, Vec<u8>), NodeError> {
        self.files
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| NodeError::Fatal(format!("file '{id}' not found")))
    }

    async fn delete(&self, id: Uuid) -> Result<(), NodeError> {
        self.files.write().await.remove(&id);
        Ok(())
    }

    async fn list(
        &self,
        scope: Option<AccessScope>,
        tags: &[String],
        limit: usize,
    ) -> Result<Vec<FileEntry>, NodeError> {
        let files = self.files.read().await;
        let mut out: Vec<FileEntry> = files
            .values()
            .map(|(entry, _)| entry.clone())
            .filter(|entry| scope.map(|s| s == entry.access_scope).unwrap_or(true))
            .filter(|entry| tags.iter().all(|t| entry.tags.contains(t)))
            .collect();
        out.sort_by_key(|e| e.created_at);
        out.truncate(limit);
        Ok(out)
    }

    async fn get_metadata(&self, id: Uuid) -> Result<FileEntry, NodeError> {
        self.files
            .read()
            .await
            .get(&id)
            .map(|(entry, _)| entry.clone())
            .ok_or_else(|| NodeError::Fatal(format!("file '{id}' not found")))
    }

    async fn get_usage(&self) -> Result<u64, NodeError> {
        Ok(self
            .files
            .read()
            .await
            .values()
            .map(|(_, data)| data.len() as u64)
            .sum())
    }

    async fn exists(&self, id: Uuid) -> Result<bool, NodeError> {
        Ok(self.files.read().await.contains_key(&id))
    }
}

pub struct FileStorageExecutor {
    backend: Arc<dyn FileStorageBackend>,
    http: reqwest::Client,
}

impl FileStorageExecutor {
    pub fn new(backend: Arc<dyn FileStorageBackend>) -> Self {
        Self {
            backend,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Executor for FileStorageExecutor {
    async fn execute(
        &self,
        _ctx: &ExecutionContext,
        config: &Value,
        _input: &Value,
    ) -> Result<Value, NodeError> {
        match config.require_str("action")?.as_str() {
            "store" => self.store(config).await,
            "get" => self.get(config).await,
            "delete" => self.delete(config).await,
            "list" => self.list(config).await,
            "metadata" => self.metadata(config).await,
            other => Err(NodeError::Fatal(format!("unknown file_storage action '{other}'"))),
        }
    }

    fn validate(&self, config: &Value) -> Result<(), NodeError> {
        let action = config.require_str("action")?;
        match action.as_str() {
            "store" => {
                if config.get("file_data").is_none() && config.get("file_url").is_none() {
                    return Err(NodeError::Fatal(
                        "store action requires 'file_data' or 'file_url'".into(),
                    ));
                }
                Ok(())
            }
            "get" | "delete" | "metadata" => {
                config.require_str("file_id")?;
                Ok(())
            }
            "list" => Ok(()),
            other => Err(NodeError::Fatal(format!("unknown file_storage action '{other}'"))),
        }
    }
}

impl FileStorageExecutor {
    async fn store(&self, config: &Value) -> Result<Value, NodeError> {
        let filename = config.get_str("filename", "file");
        let scope = AccessScope::parse(&config.get_str("access_scope", "workflow"))?;
        let tags = config.get_string_list("tags");
        let ttl = config.get_i64("ttl", 0);

        let data = if let Some(b64) = config.get("file_data").and_then(Value::as_str) {
            base64::engine::general_purpose::STANDARD
                .decode(b64)
                .map_err(|e| NodeError::Fatal(format!("invalid base64 file_data: {e}")))?
        } else if let Some(url) = config.get("file_url").and_then(Value::as_str) {
            let response = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|e| NodeError::Retryable(format!("file download failed: {e}")))?;
            if !response.status().is_success() {
                return Err(NodeError::Retryable(format!(
                    "file download returned status {}",
                    response.status()
                )));
            }
            response
                .bytes()
                .await
                .map_err(|e| NodeError::Retryable(format!("failed reading downloaded file: {e}")))?
                .to_vec()
        } else {
            return Err(NodeError::Fatal(
                "store action requires 'file_data' or 'file_url'".into(),
            ));
        };

        let mime_type = config
            .get("mime_type")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| sniff_mime(&data))
            .or_else(|| mime_from_filename(&filename))
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let entry = FileEntry {
            id: Uuid::new_v4(),
            filename,
            mime_type,
            size: data.len(),
            access_scope: scope,
            tags,
            created_at: Utc::now(),
            expires_at: (ttl > 0).then(|| Utc::now() + ChronoDuration::seconds(ttl)),
        };

        let stored = self.backend.store(entry, data).await?;
        Ok(json!({
            "file_id": stored.id,
            "filename": stored.filename,
            "mime_type": stored.mime_type,
            "size": stored.size,
        }))
    }

    async fn get(&self, config: &Value) -> Result<Value, NodeError> {
        let id = parse_file_id(&config.require_str("file_id")?)?;
        let (entry, data) = self.backend.get(id).await?;
        Ok(json!({
            "file_id": entry.id,
            "filename": entry.filename,
            "mime_type": entry.mime_type,
            "size": entry.size,
            "content_base64": base64::engine::general_purpose::STANDARD.encode(&data),
        }))
    }

    async fn delete(&self, config: &Value) -> Result<Value, NodeError> {
        let id = parse_file_id(&config.require_str("file_id")?)?;
        self.backend.delete(id).await?;
        Ok(json!({ "file_id": id, "deleted": true }))
    }

    async fn list(&self, config: &Value) -> Result<Value, NodeError> {
        let scope = config
            .get("access_scope")
            .and_then(Value::as_str)
            .map(AccessScope::parse)
            .transpose()?;
        let tags = config.get_string_list("tags");
        let limit = config.get_i64("limit", 100).max(0) as usize;
        let entries = self.backend.list(scope, &tags, limit).await?;
        Ok(json!({ "files": entries }))
    }

    async fn metadata(&self, config: &Value) -> Result<Value, NodeError> {
        let id = parse_file_id(&config.require_str("file_id")?)?;
        let entry = self.backend.get_metadata(id).await?;
        Ok(serde_json::to_value(entry).unwrap_or(Value::Null))
    }
}

fn parse_file_id(s: &str) -> Result<Uuid, NodeError> {
    Uuid::parse_str(s).map_err(|e| NodeError::Fatal(format!("invalid file_id: {e}")))
}

/// Leading-bytes MIME sniffing for the handful of signatures the spec's
/// binary-detection rule cares about.
fn sniff_mime(data: &[u8]) -> Option<String> {
    let sig = |needle: &[u8]| data.starts_with(needle);
    if sig(b"\x89PNG\r\n\x1a\n") {
        Some("image/png".to_string())
    } else if sig(b"\xff\xd8\xff") {
        Some("image/jpeg".to_string())
    } else if sig(b"GIF87a") || sig(b"GIF89a") {
        Some("image/gif".to_string())
    } else if sig(b"%PDF-") {
        Some("application/pdf".to_string())
    } else if sig(b"PK\x03\x04") {
        Some("application/zip".to_string())
    } else if sig(&[0x1f, 0x8b]) {
        Some("application/gzip".to_string())
    } else {
        None
    }
}

fn mime_from_filename(filename: &str) -> Option<String> {
    let ext = filename.rsplit('.').next()?.to_ascii_lowercase();
    Some(
        match ext.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "pdf" => "application/pdf",
            "json" => "application/json",
            "txt" => "text/plain",
            "zip" => "application/zip",
            "gz" => "application/gzip",
            "csv" => "text/csv",
            _ => return None,
        }
        .to_string(),
    )
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

    fn executor() -> FileStorageExecutor {
        FileStorageExecutor::new(Arc::new(InMemoryFileStorage::new()))
    }

    #[tokio::test]
    async fn store_then_get_round_trips_content() {
        let exec = executor();
        let b64 = base64::engine::general_purpose::STANDARD.encode(b"hello world");
        let stored = exec
            .execute(
                &ctx(),
                &json!({"action": "store", "file_data": b64, "filename": "greeting.txt"}),
                &Value::Null,
            )
            .await
            .unwrap();
        let file_id = stored["file_id"].as_str().unwrap();

        let fetched = exec
            .execute(&ctx(), &json!({"action": "get", "file_id": file_id}), &Value::Null)
            .await
            .unwrap();
        assert_eq!(fetched["content_base64"], json!(b64));
    }

    #[tokio::test]
    async fn mime_type_inferred_from_png_signature() {
        let exec = executor();
        let mut png_bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        png_bytes.extend_from_slice(b"rest-of-file");
        let b64 = base64::engine::general_purpose::STANDARD.encode(&png_bytes);
        let stored = exec
            .execute(
                &ctx(),
                &json!({"action": "store", "file_data": b64, "filename": "x"}),
                &Value::Null,
            )
            .await
            .unwrap();
        assert_eq!(stored["mime_type"], json!("image/png"));
    }

    #[tokio::test]
    async fn delete_then_get_fails() {
        let exec = executor();
        let b64 = base64::engine::general_purpose::STANDARD.encode(b"x");
        let stored = exec
            .execute(
                &ctx(),
                &json!({"action": "store", "file_data": b64, "filename": "x"}),
                &Value::Null,
            )
            .await
            .unwrap();
        let file_id = stored["file_id"].as_str().unwrap().to_string();

        exec.execute(&ctx(), &json!({"action": "delete", "file_id": file_id}), &Value::Null)
            .await
            .unwrap();

        let err = exec
            .execute(&ctx(), &json!({"action": "get", "file_id": file_id}), &Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Fatal(_)));
    }
}
