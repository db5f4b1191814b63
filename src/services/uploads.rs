//! Image uploads pushed to object storage.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    storage::{image_content_type, ObjectStorage},
};

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadedFile {
    pub url: String,
    pub key: String,
}

/// Lowercased extension of `filename`, without the dot.
pub fn file_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    (!ext.is_empty()).then(|| ext.to_ascii_lowercase())
}

/// Storage key for an upload. Product and employee pictures get their own
/// prefixes; everything else lands under the caller's role.
pub fn upload_key(
    actor: &AuthUser,
    folder: Option<&str>,
    employee_id: Option<i32>,
    file_name: &str,
) -> String {
    let owner = actor.user_id;
    match folder {
        Some("product") => format!("products/{}/{}", owner, file_name),
        Some("employee") => match employee_id {
            Some(id) => format!("employees/{}/{}/{}", owner, id, file_name),
            None => format!("employees/{}/{}", owner, file_name),
        },
        _ => format!("uploads/{}/{}/{}", actor.role, owner, file_name),
    }
}

#[derive(Clone)]
pub struct UploadService {
    storage: Arc<dyn ObjectStorage>,
    max_bytes: usize,
}

impl UploadService {
    pub fn new(storage: Arc<dyn ObjectStorage>, max_bytes: usize) -> Self {
        Self { storage, max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    #[instrument(skip(self, actor, bytes), fields(user_id = actor.user_id, size = bytes.len()))]
    pub async fn upload_image(
        &self,
        actor: &AuthUser,
        filename: &str,
        bytes: Vec<u8>,
        folder: Option<&str>,
        employee_id: Option<i32>,
    ) -> Result<UploadedFile, ServiceError> {
        let invalid = || ServiceError::BadRequest("invalid file type. Only images are allowed".into());
        let ext = file_extension(filename).ok_or_else(invalid)?;
        let content_type = image_content_type(&ext).ok_or_else(invalid)?;
        if bytes.len() > self.max_bytes {
            return Err(ServiceError::BadRequest("file size exceeds 5MB limit".into()));
        }

        let file_name = format!(
            "{}-{}.{}",
            Utc::now().timestamp(),
            &uuid::Uuid::new_v4().simple().to_string()[..8],
            ext
        );
        let key = upload_key(actor, folder, employee_id, &file_name);
        let url = self.storage.put(&key, bytes, content_type).await?;
        info!(%key, "image uploaded");
        Ok(UploadedFile { url, key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::user::Role;
    use crate::storage::LocalStorage;

    fn store() -> AuthUser {
        AuthUser {
            user_id: 7,
            email: "store@example.com".into(),
            role: Role::Store,
            admin_level: None,
            employee: None,
        }
    }

    #[test]
    fn extensions_are_lowercased() {
        assert_eq!(file_extension("logo.PNG").as_deref(), Some("png"));
        assert_eq!(file_extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(file_extension("noext"), None);
        assert_eq!(file_extension("trailing."), None);
    }

    #[test]
    fn keys_follow_the_folder() {
        let actor = store();
        assert_eq!(upload_key(&actor, Some("product"), None, "a.png"), "products/7/a.png");
        assert_eq!(
            upload_key(&actor, Some("employee"), Some(3), "a.png"),
            "employees/7/3/a.png"
        );
        assert_eq!(upload_key(&actor, Some("logo"), None, "a.png"), "uploads/store/7/a.png");
    }

    #[tokio::test]
    async fn rejects_non_images_and_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        let service = UploadService::new(Arc::new(LocalStorage::new(dir.path(), "")), 4);

        let err = service
            .upload_image(&store(), "notes.pdf", vec![1], None, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid file type. Only images are allowed");

        let err = service
            .upload_image(&store(), "big.jpg", vec![0; 5], None, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "file size exceeds 5MB limit");

        let uploaded = service
            .upload_image(&store(), "ok.jpg", vec![0; 4], Some("product"), None)
            .await
            .unwrap();
        assert!(uploaded.key.starts_with("products/7/"));
        assert!(uploaded.url.ends_with(&uploaded.key));
    }
}
