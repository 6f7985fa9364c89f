//! File storage — uploads resume artifacts and reads them back by path.
//!
//! Production backend is S3 (or MinIO locally). The workflow only sees the
//! `FileStorage` trait, so tests swap in an in-memory store.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("upload of '{name}' failed: {detail}")]
    Upload { name: String, detail: String },

    #[error("download of '{path}' failed: {detail}")]
    Download { path: String, detail: String },
}

/// A file held in memory, as received from the client or produced locally.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }
}

/// Handle to a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub path: String,
    pub size: usize,
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn upload(&self, file: &UploadedFile) -> Result<StoredObject, StorageError>;

    async fn download(&self, path: &str) -> Result<Bytes, StorageError>;
}

/// Builds the object path for an upload: `uploads/<uuid>/<sanitized name>`.
pub fn object_path(file_name: &str) -> String {
    format!("uploads/{}/{}", Uuid::new_v4(), sanitize_file_name(file_name))
}

/// Keeps ASCII alphanumerics plus `.`, `-` and `_`; everything else becomes `_`.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

/// S3-backed storage.
#[derive(Clone)]
pub struct S3Storage {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl FileStorage for S3Storage {
    async fn upload(&self, file: &UploadedFile) -> Result<StoredObject, StorageError> {
        let key = object_path(&file.file_name);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(file.bytes.clone()))
            .content_type(&file.content_type)
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                name: file.file_name.clone(),
                detail: e.to_string(),
            })?;

        info!("Uploaded {} bytes to s3://{}/{}", file.bytes.len(), self.bucket, key);

        Ok(StoredObject {
            path: key,
            size: file.bytes.len(),
        })
    }

    async fn download(&self, path: &str) -> Result<Bytes, StorageError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| StorageError::Download {
                path: path.to_string(),
                detail: e.to_string(),
            })?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Download {
                path: path.to_string(),
                detail: e.to_string(),
            })?;

        Ok(body.into_bytes())
    }
}
