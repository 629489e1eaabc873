use axum::{
    extract::{Multipart, Path, State},
    http::header::CONTENT_TYPE,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::validation::{asset_content_type, validate_asset_upload, validate_path_segment};
use crate::core::state::AppState;
use crate::db::types::ExamType;
use crate::services::storage::{AssetKind, STORAGE_PATH_PREFIX};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/:folder/:exam_type/:filename", get(fetch_submission_pdf))
}

pub(crate) fn assets_router() -> Router<AppState> {
    Router::new()
        .route("/:kind", post(upload_asset))
        .route("/:kind/:filename", get(fetch_asset))
}

/// Serves a stored submission PDF. The folder segment carries the composite
/// `{name}_{id}` key; the id half is recovered by splitting on the last
/// underscore.
async fn fetch_submission_pdf(
    Path((folder, exam_type, filename)): Path<(String, String, String)>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    validate_path_segment(&folder)?;
    validate_path_segment(&filename)?;
    if filename.starts_with('.') {
        return Err(ApiError::BadRequest("Invalid path segment".to_string()));
    }

    let exam_type = ExamType::parse(&exam_type)
        .ok_or_else(|| ApiError::BadRequest("Unknown exam type".to_string()))?;

    let Some((name, examinee_id)) = folder.rsplit_once('_') else {
        return Err(ApiError::BadRequest("Invalid examinee folder".to_string()));
    };
    if name.is_empty()
        || examinee_id.is_empty()
        || !examinee_id.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(ApiError::BadRequest("Invalid examinee folder".to_string()));
    }

    let relative_path = format!("{STORAGE_PATH_PREFIX}/{folder}/{}/{filename}", exam_type.as_str());
    let bytes = state
        .storage()
        .read_submission_file(&relative_path)
        .await
        .map_err(|err| ApiError::internal(err, "Failed to read submission file"))?
        .ok_or_else(|| ApiError::NotFound("Submission file not found".to_string()))?;

    Ok(([(CONTENT_TYPE, "application/pdf")], bytes))
}

async fn upload_asset(
    Path(kind): Path<String>,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let kind = AssetKind::parse(&kind)
        .ok_or_else(|| ApiError::BadRequest("Unknown asset kind".to_string()))?;

    let mut file_bytes: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;
    let mut content_type: Option<String> = None;
    let max_bytes = state.settings().storage().max_upload_size_mb * 1024 * 1024;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("Invalid multipart data".to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            filename = field.file_name().map(|s| s.to_string());
            content_type = field.content_type().map(|s| s.to_string());
            let mut bytes = Vec::new();
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|_| ApiError::BadRequest("Failed to read file".to_string()))?
            {
                let next_size = bytes.len() as u64 + chunk.len() as u64;
                if next_size > max_bytes {
                    return Err(ApiError::BadRequest(format!(
                        "File size exceeds {}MB limit",
                        state.settings().storage().max_upload_size_mb
                    )));
                }
                bytes.extend_from_slice(&chunk);
            }
            file_bytes = Some(bytes);
        }
    }

    let file_bytes =
        file_bytes.ok_or_else(|| ApiError::BadRequest("File is required".to_string()))?;
    if file_bytes.is_empty() {
        return Err(ApiError::BadRequest("File is empty".to_string()));
    }
    let filename =
        filename.ok_or_else(|| ApiError::BadRequest("Filename is required".to_string()))?;
    let content_type = content_type.unwrap_or_else(|| "application/octet-stream".to_string());

    let allowed = match kind {
        AssetKind::Audio => &state.settings().storage().allowed_audio_extensions,
        AssetKind::Image => &state.settings().storage().allowed_image_extensions,
    };
    validate_asset_upload(&filename, &content_type, kind, allowed)?;

    let stored = state
        .storage()
        .store_asset(kind, &filename, &file_bytes)
        .await
        .map_err(|err| ApiError::internal(err, "Failed to store asset file"))?;

    let kind_label = match kind {
        AssetKind::Audio => "audio",
        AssetKind::Image => "image",
    };
    metrics::counter!("asset_uploads_total", "kind" => kind_label).increment(1);
    tracing::info!(filename = %stored.filename, kind = kind_label, "Asset uploaded");

    Ok(Json(serde_json::json!({
        "filename": stored.filename,
        "path": stored.relative_path,
        "size": file_bytes.len(),
    })))
}

async fn fetch_asset(
    Path((kind, filename)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = AssetKind::parse(&kind)
        .ok_or_else(|| ApiError::BadRequest("Unknown asset kind".to_string()))?;
    validate_path_segment(&filename)?;

    let bytes = state
        .storage()
        .read_asset(kind, &filename)
        .await
        .map_err(|err| ApiError::internal(err, "Failed to read asset file"))?
        .ok_or_else(|| ApiError::NotFound("Asset not found".to_string()))?;

    Ok(([(CONTENT_TYPE, asset_content_type(&filename))], bytes))
}

#[cfg(test)]
mod tests {
    use axum::http::{header, Method, StatusCode};
    use tower::ServiceExt;

    use crate::test_support;

    #[tokio::test]
    async fn audio_upload_and_fetch_roundtrip() {
        let ctx = test_support::setup_test_context().await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::multipart_request(
                "/api/v1/assets/audio",
                "section one.mp3",
                "audio/mpeg",
                b"ID3 fake audio bytes",
            ))
            .await
            .expect("upload");
        let status = response.status();
        let uploaded = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::OK, "response: {uploaded}");

        let filename = uploaded["filename"].as_str().expect("filename");
        assert!(filename.ends_with(".mp3"));
        assert!(uploaded["path"].as_str().expect("path").starts_with("storage/audio_uploads/"));

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/v1/assets/audio/{filename}"),
                None,
            ))
            .await
            .expect("fetch");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).and_then(|value| value.to_str().ok()),
            Some("audio/mpeg")
        );
        let bytes = test_support::read_bytes(response).await;
        assert_eq!(bytes, b"ID3 fake audio bytes");
    }

    #[tokio::test]
    async fn upload_rejects_mismatched_mime() {
        let ctx = test_support::setup_test_context().await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::multipart_request(
                "/api/v1/assets/audio",
                "clip.mp3",
                "image/png",
                b"not audio",
            ))
            .await
            .expect("upload");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upload_rejects_unknown_kind_and_fetch_rejects_traversal() {
        let ctx = test_support::setup_test_context().await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::multipart_request(
                "/api/v1/assets/video",
                "clip.mp4",
                "video/mp4",
                b"...",
            ))
            .await
            .expect("upload");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(Method::GET, "/api/v1/assets/audio/..", None))
            .await
            .expect("fetch");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
