use axum::{extract::State, Json};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::validation::{validate_examinee_id, validate_examinee_name};
use crate::core::state::AppState;
use crate::schemas::submission::{format_primitive, SubmitExamRequest};
use crate::services::exam_timer::{SubmitClaim, TimerKey};
use crate::services::submission_pipeline::{self, FinalizeMode, SubmissionInput};

/// Manual submission endpoint. Both this path and timer expiry funnel into
/// the same pipeline; the timer's one-shot guard decides which one wins.
pub(in crate::api::submissions) async fn submit_exam(
    State(state): State<AppState>,
    Json(payload): Json<SubmitExamRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    payload.validate().map_err(|err| ApiError::BadRequest(err.to_string()))?;
    validate_examinee_name(&payload.examinee_name)?;
    validate_examinee_id(&payload.examinee_id)?;

    let key = TimerKey {
        examinee_name: payload.examinee_name.clone(),
        examinee_id: payload.examinee_id.clone(),
        exam_type: payload.exam_type,
    };

    let claim = state.timers().try_claim_submit(&key).await;
    match claim {
        SubmitClaim::AlreadySubmitted => {
            tracing::info!(
                examinee_id = %payload.examinee_id,
                exam_type = %payload.exam_type,
                "Duplicate submit ignored, already submitted"
            );
            return Ok(Json(serde_json::json!({
                "status": "already_submitted",
                "detail": "This exam has already been submitted",
            })));
        }
        // No countdown registered means a direct submission; claimed means
        // this caller won the race against expiry.
        SubmitClaim::NoTimer | SubmitClaim::Claimed => {}
    }

    let result = submission_pipeline::finalize_submission(
        &state,
        SubmissionInput {
            exam_type: payload.exam_type,
            exam_id: payload.exam_id,
            exam_title: &payload.exam_title,
            examinee_name: &payload.examinee_name,
            examinee_id: &payload.examinee_id,
            answers: &payload.answers,
            time_spent: payload.time_spent,
            document: payload.document.as_deref(),
        },
        FinalizeMode::ManualSubmit,
    )
    .await;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => {
            // A failed attempt must stay retryable.
            if claim == SubmitClaim::Claimed {
                state.timers().release_claim(&key).await;
            }
            return Err(super::helpers::map_pipeline_error(err));
        }
    };

    Ok(Json(serde_json::json!({
        "status": "submitted",
        "id": outcome.submission_id,
        "pdf_filename": outcome.pdf_filename,
        "pdf_path": outcome.relative_path,
        "pdf_size": outcome.pdf_size,
        "pdf_sha256": outcome.pdf_sha256,
        "folder": outcome.folder,
        "submitted_at": format_primitive(outcome.submitted_at),
    })))
}
