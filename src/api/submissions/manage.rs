use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::api::errors::ApiError;
use crate::api::pagination::{default_limit, PaginatedResponse};
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::submission::SubmissionResponse;
use crate::services::cleanup::{self, DeleteOutcome};

#[derive(Debug, Deserialize)]
pub(in crate::api::submissions) struct ListSubmissionsQuery {
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

pub(in crate::api::submissions) async fn list_submissions(
    Query(query): Query<ListSubmissionsQuery>,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<SubmissionResponse>>, ApiError> {
    let limit = query.limit.clamp(1, 500);
    let skip = query.skip.max(0);

    let submissions = repositories::submissions::list(state.db(), skip, limit)
        .await
        .map_err(|err| ApiError::internal(err, "Failed to list submissions"))?;
    let total_count = repositories::submissions::count(state.db())
        .await
        .map_err(|err| ApiError::internal(err, "Failed to count submissions"))?;

    Ok(Json(PaginatedResponse {
        items: submissions.into_iter().map(SubmissionResponse::from).collect(),
        total_count,
        skip,
        limit,
    }))
}

pub(in crate::api::submissions) async fn get_submission(
    Path(submission_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let submission = repositories::submissions::find_by_id(state.db(), submission_id)
        .await
        .map_err(|err| ApiError::internal(err, "Failed to fetch submission"))?
        .ok_or_else(|| ApiError::NotFound("Submission not found".to_string()))?;

    Ok(Json(submission.into()))
}

pub(in crate::api::submissions) async fn list_by_examinee(
    Path(examinee_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<SubmissionResponse>>, ApiError> {
    let submissions = repositories::submissions::list_by_examinee(state.db(), &examinee_id)
        .await
        .map_err(|err| ApiError::internal(err, "Failed to list submissions"))?;

    Ok(Json(submissions.into_iter().map(SubmissionResponse::from).collect()))
}

/// Idempotent by contract: deleting an id that is already gone is success.
pub(in crate::api::submissions) async fn delete_submission(
    Path(submission_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = cleanup::delete_submission(&state, submission_id)
        .await
        .map_err(|err| ApiError::internal(err, "Failed to delete submission"))?;

    let status = match outcome {
        DeleteOutcome::Deleted => "deleted",
        DeleteOutcome::AlreadyAbsent => "already_deleted",
    };
    Ok(Json(serde_json::json!({ "status": status, "submission_id": submission_id })))
}

pub(in crate::api::submissions) async fn delete_by_examinee(
    Path(examinee_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let purge = cleanup::delete_examinee(&state, &examinee_id)
        .await
        .map_err(|err| ApiError::internal(err, "Failed to delete examinee submissions"))?;

    Ok(Json(serde_json::json!({
        "status": "deleted",
        "examinee_id": examinee_id,
        "rows_deleted": purge.rows_deleted,
        "folders_removed": purge.folders_removed,
    })))
}

pub(in crate::api::submissions) async fn delete_all_submissions(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let purge = cleanup::delete_all(&state)
        .await
        .map_err(|err| ApiError::internal(err, "Failed to delete all submissions"))?;

    Ok(Json(serde_json::json!({
        "status": "deleted",
        "rows_deleted": purge.rows_deleted,
        "folders_removed": purge.folders_removed,
    })))
}
