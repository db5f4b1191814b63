//! Object storage for uploaded images and generated invoices.
//!
//! Callers only see `put(key, bytes, content_type) -> url`; the local
//! implementation writes below a directory that the router serves at
//! `/uploads`.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error};

use crate::errors::ServiceError;

/// Public URL prefix under which `LocalStorage` files are served.
pub const UPLOADS_ROUTE: &str = "/uploads";

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `bytes` under `key` and returns the public URL.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<String, ServiceError>;
}

/// Filesystem-backed storage.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: format!("{}{}", public_base_url.trim_end_matches('/'), UPLOADS_ROUTE),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, ServiceError> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !safe {
            return Err(ServiceError::BadRequest(format!("invalid storage key: {}", key)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ServiceError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                error!(error = %e, dir = %parent.display(), "failed to create upload directory");
                ServiceError::StorageError(e.to_string())
            })?;
        }
        tokio::fs::write(&path, &bytes).await.map_err(|e| {
            error!(error = %e, path = %path.display(), "failed to write object");
            ServiceError::StorageError(e.to_string())
        })?;
        debug!(key, content_type, size = bytes.len(), "stored object");
        Ok(format!("{}/{}", self.base_url, key))
    }
}

/// Maps an allowed image extension to its content type.
pub fn image_content_type(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
