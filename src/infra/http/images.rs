use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;

use crate::application::images::ImageUpload;
use crate::application::validation::FieldErrors;

use super::articles::multipart_error;
use super::error::ApiError;
use super::state::ApiState;

#[derive(Debug, Deserialize)]
pub struct DeleteImageRequest {
    pub path: Option<String>,
}

/// `POST /images` — standalone image upload. The size gate runs before any
/// validation work.
pub async fn upload_image(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some("image") {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let content_type = field.content_type().map(ToString::to_string);
            let data = field.bytes().await.map_err(multipart_error)?;

            if data.len() > state.max_image_bytes {
                return Err(ApiError::PayloadTooLarge {
                    size_bytes: data.len(),
                    limit_bytes: state.max_image_bytes,
                });
            }

            upload = Some(ImageUpload {
                filename,
                content_type,
                data,
            });
            break;
        }
    }

    let Some(upload) = upload else {
        let mut errors = FieldErrors::default();
        errors.push("image", "The image field is required.");
        return Err(ApiError::Validation(errors));
    };

    let stored = state.images.upload(upload).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Image uploaded successfully",
            "path": stored.path,
            "url": stored.url,
            "size": stored.size_bytes,
        })),
    ))
}

/// `DELETE /images` — remove a stored image by its relative path.
pub async fn delete_image(
    State(state): State<ApiState>,
    Json(payload): Json<DeleteImageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(path) = payload.path.filter(|path| !path.is_empty()) else {
        let mut errors = FieldErrors::default();
        errors.push("path", "The path field is required.");
        return Err(ApiError::Validation(errors));
    };

    state.images.delete(&path).await?;
    Ok(Json(json!({ "message": "Image deleted successfully" })))
}
