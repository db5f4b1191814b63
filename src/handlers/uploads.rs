use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use tracing::warn;
use utoipa::IntoParams;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::ApiQuery,
    services::uploads::UploadedFile,
    AppState,
};

/// Multipart framing overhead allowed on top of the file itself.
const MULTIPART_SLACK_BYTES: usize = 64 * 1024;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UploadQuery {
    /// `product`, `employee`, `logo`, `banner`, `message` or `payment`.
    #[serde(rename = "type")]
    pub folder: Option<String>,
    pub employee_id: Option<i32>,
}

fn multipart_error(err: MultipartError) -> ServiceError {
    warn!(error = %err, "rejected multipart upload");
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::BadRequest("file size exceeds 5MB limit".into())
    } else {
        ServiceError::BadRequest(err.body_text())
    }
}

pub fn upload_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload_image))
        .layer(DefaultBodyLimit::max(max_upload_bytes + MULTIPART_SLACK_BYTES))
}

#[utoipa::path(
    post,
    path = "/api/upload",
    tag = "Uploads",
    params(UploadQuery),
    request_body(content_type = "multipart/form-data", description = "Image in the `file` field"),
    responses(
        (status = 200, description = "Stored image URL and key", body = UploadedFile),
        (status = 400, description = "Missing file, not an image or too large", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn upload_image(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiQuery(query): ApiQuery<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<UploadedFile>, ServiceError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        let uploaded = state
            .services
            .uploads
            .upload_image(
                &auth_user,
                &filename,
                bytes.to_vec(),
                query.folder.as_deref(),
                query.employee_id,
            )
            .await?;
        return Ok(Json(uploaded));
    }

    Err(ServiceError::BadRequest("file is required".into()))
}
