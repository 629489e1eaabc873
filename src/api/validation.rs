use std::path::Path;

use crate::api::errors::ApiError;
use crate::services::storage::AssetKind;

/// Examinee ids are strictly alphanumeric. This is what keeps the
/// `{name}_{id}` folder convention parseable on the last underscore.
pub(crate) fn validate_examinee_id(examinee_id: &str) -> Result<(), ApiError> {
    let valid = !examinee_id.is_empty()
        && examinee_id.len() <= 64
        && examinee_id.chars().all(|c| c.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(ApiError::BadRequest("examinee_id must be alphanumeric".to_string()))
    }
}

/// Names become path segments; path separators and relative markers are
/// rejected outright.
pub(crate) fn validate_examinee_name(examinee_name: &str) -> Result<(), ApiError> {
    let valid = !examinee_name.trim().is_empty()
        && examinee_name.len() <= 100
        && !examinee_name.contains('/')
        && !examinee_name.contains('\\')
        && !examinee_name.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(ApiError::BadRequest(
            "examinee_name must be a plain name without path separators".to_string(),
        ))
    }
}

pub(crate) fn validate_asset_upload(
    filename: &str,
    content_type: &str,
    kind: AssetKind,
    allowed_extensions: &[String],
) -> Result<(), ApiError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .ok_or_else(|| ApiError::BadRequest("File must have an extension".to_string()))?;

    if !allowed_extensions.iter().any(|allowed| allowed == &extension) {
        return Err(ApiError::BadRequest(format!("File extension '{extension}' is not allowed")));
    }

    let mime = content_type.trim().to_ascii_lowercase();
    let matches = match kind {
        AssetKind::Audio => audio_mime_allowed(&mime, &extension),
        AssetKind::Image => image_mime_allowed(&mime, &extension),
    };

    if matches {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "MIME type '{mime}' does not match extension '.{extension}'"
        )))
    }
}

/// Path segments from the URL must stay single path components.
pub(crate) fn validate_path_segment(segment: &str) -> Result<(), ApiError> {
    let valid = !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains('/')
        && !segment.contains('\\');
    if valid {
        Ok(())
    } else {
        Err(ApiError::BadRequest("Invalid path segment".to_string()))
    }
}

fn audio_mime_allowed(mime: &str, extension: &str) -> bool {
    match extension {
        "mp3" => matches!(mime, "audio/mpeg" | "audio/mp3"),
        "wav" => matches!(mime, "audio/wav" | "audio/x-wav" | "audio/wave"),
        "m4a" => matches!(mime, "audio/mp4" | "audio/x-m4a" | "audio/m4a"),
        "ogg" => mime == "audio/ogg",
        _ => false,
    }
}

fn image_mime_allowed(mime: &str, extension: &str) -> bool {
    match extension {
        "jpg" | "jpeg" => matches!(mime, "image/jpeg" | "image/jpg"),
        "png" => mime == "image/png",
        "webp" => mime == "image/webp",
        "gif" => mime == "image/gif",
        _ => false,
    }
}

pub(crate) fn asset_content_type(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}
