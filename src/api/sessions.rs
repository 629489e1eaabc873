use axum::{
    extract::{Query, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::validation::{validate_examinee_id, validate_examinee_name};
use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::repositories;
use crate::schemas::session::{
    SaveDraftRequest, SessionQuery, SessionStatusResponse, StartSessionRequest,
    StartSessionResponse,
};
use crate::services::exam_timer::TimerKey;
use crate::services::storage::ActiveExamMarker;
use crate::services::submission_pipeline;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(start_session))
        .route("/draft", put(save_draft))
        .route("/status", get(session_status))
        .route("/", delete(abandon_session))
}

/// Loads the exam, drops the advisory marker, and starts the countdown.
/// Re-entering while the countdown is already running refreshes nothing but
/// returns the live remaining time.
async fn start_session(
    State(state): State<AppState>,
    Json(payload): Json<StartSessionRequest>,
) -> Result<Json<StartSessionResponse>, ApiError> {
    payload.validate().map_err(|err| ApiError::BadRequest(err.to_string()))?;
    validate_examinee_name(&payload.examinee_name)?;
    validate_examinee_id(&payload.examinee_id)?;

    let exam = repositories::exams::find_by_id(state.db(), payload.exam_id)
        .await
        .map_err(|err| ApiError::internal(err, "Failed to fetch exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;

    let key = TimerKey {
        examinee_name: payload.examinee_name.clone(),
        examinee_id: payload.examinee_id.clone(),
        exam_type: exam.exam_type,
    };

    // Folders appear lazily at exam start; a resumed session keeps whatever
    // draft the previous marker held.
    state
        .storage()
        .ensure_examinee_folder(&key.examinee_name, &key.examinee_id)
        .await
        .map_err(|err| ApiError::internal(err, "Failed to create examinee folder"))?;
    let previous = state
        .storage()
        .read_active_marker(&key.examinee_name, &key.examinee_id, key.exam_type)
        .await
        .map_err(|err| ApiError::internal(err, "Failed to read active exam marker"))?;
    let draft_answers =
        previous.map(|marker| marker.answers).unwrap_or_else(|| serde_json::json!({}));

    let marker = ActiveExamMarker {
        exam_id: exam.id,
        exam_title: exam.title.clone(),
        started_at: format_primitive(primitive_now_utc()),
        answers: draft_answers,
    };
    state
        .storage()
        .write_active_marker(&key.examinee_name, &key.examinee_id, key.exam_type, &marker)
        .await
        .map_err(|err| ApiError::internal(err, "Failed to write active exam marker"))?;

    let exam_settings = state.settings().exam();
    let status = state
        .timers()
        .start(key.clone(), exam_settings.duration_seconds, exam_settings.warning_threshold_seconds, {
            let state = state.clone();
            let exam_id = exam.id;
            let exam_title = exam.title.clone();
            move || submission_pipeline::auto_submit_expired(state, key, exam_id, exam_title)
        })
        .await;

    tracing::info!(
        exam_id = exam.id,
        examinee_id = %payload.examinee_id,
        exam_type = %exam.exam_type,
        remaining_seconds = status.remaining_seconds,
        "Exam session started"
    );

    Ok(Json(StartSessionResponse {
        exam_id: exam.id,
        exam_type: exam.exam_type,
        exam_title: exam.title,
        duration_seconds: exam_settings.duration_seconds,
        remaining_seconds: status.remaining_seconds,
        phase: status.phase,
    }))
}

/// Rewrites the marker's draft answers. Advisory resume state only.
async fn save_draft(
    State(state): State<AppState>,
    Json(payload): Json<SaveDraftRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    payload.validate().map_err(|err| ApiError::BadRequest(err.to_string()))?;
    validate_examinee_name(&payload.examinee_name)?;
    validate_examinee_id(&payload.examinee_id)?;

    let existing = state
        .storage()
        .read_active_marker(&payload.examinee_name, &payload.examinee_id, payload.exam_type)
        .await
        .map_err(|err| ApiError::internal(err, "Failed to read active exam marker"))?
        .ok_or_else(|| ApiError::NotFound("No active exam session".to_string()))?;

    let marker = ActiveExamMarker { answers: payload.answers, ..existing };
    state
        .storage()
        .write_active_marker(&payload.examinee_name, &payload.examinee_id, payload.exam_type, &marker)
        .await
        .map_err(|err| ApiError::internal(err, "Failed to write active exam marker"))?;

    Ok(Json(serde_json::json!({ "status": "saved" })))
}

async fn session_status(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    let timer = state
        .timers()
        .status(&TimerKey {
            examinee_name: query.examinee_name.clone(),
            examinee_id: query.examinee_id.clone(),
            exam_type: query.exam_type,
        })
        .await;

    let marker = state
        .storage()
        .read_active_marker(&query.examinee_name, &query.examinee_id, query.exam_type)
        .await
        .map_err(|err| ApiError::internal(err, "Failed to read active exam marker"))?;

    let Some(timer) = timer else {
        return Err(ApiError::NotFound("No active exam session".to_string()));
    };

    let (exam_id, exam_title, draft_answers) = match marker {
        Some(marker) => (Some(marker.exam_id), Some(marker.exam_title), Some(marker.answers)),
        None => (None, None, None),
    };

    Ok(Json(SessionStatusResponse {
        phase: timer.phase,
        remaining_seconds: timer.remaining_seconds,
        warning: timer.warning,
        exam_id,
        exam_title,
        draft_answers,
    }))
}

/// Stops the countdown and removes the marker, pruning any now-empty
/// folders. Navigating away never auto-submits.
async fn abandon_session(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let cancelled = state
        .timers()
        .cancel(&TimerKey {
            examinee_name: query.examinee_name.clone(),
            examinee_id: query.examinee_id.clone(),
            exam_type: query.exam_type,
        })
        .await;

    let marker_removed = state
        .storage()
        .remove_active_marker_and_prune(&query.examinee_name, &query.examinee_id, query.exam_type)
        .await
        .map_err(|err| ApiError::internal(err, "Failed to remove active exam marker"))?;

    Ok(Json(serde_json::json!({
        "status": "abandoned",
        "timer_cancelled": cancelled,
        "marker_removed": marker_removed,
    })))
}
