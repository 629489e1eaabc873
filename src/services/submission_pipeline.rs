use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;
use time::PrimitiveDateTime;

use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::types::ExamType;
use crate::repositories;
use crate::services::exam_timer::TimerKey;
use crate::services::pdf;
use crate::services::storage::{StorageService, STORAGE_PATH_PREFIX};

#[derive(Debug, Error)]
pub(crate) enum PipelineError {
    #[error("invalid document payload: {0}")]
    InvalidPayload(String),
    #[error("failed to render submission document: {0}")]
    RenderFailed(String),
    #[error("failed to write submission file")]
    StorageWriteFailed(#[source] std::io::Error),
    #[error("submission file stored but database insert failed")]
    DatabaseFailed(#[source] sqlx::Error),
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum FinalizeMode {
    ManualSubmit,
    AutoExpire,
}

impl FinalizeMode {
    fn label(self) -> &'static str {
        match self {
            Self::ManualSubmit => "manual",
            Self::AutoExpire => "auto",
        }
    }
}

#[derive(Debug)]
pub(crate) struct SubmissionInput<'a> {
    pub(crate) exam_type: ExamType,
    pub(crate) exam_id: i64,
    pub(crate) exam_title: &'a str,
    pub(crate) examinee_name: &'a str,
    pub(crate) examinee_id: &'a str,
    pub(crate) answers: &'a serde_json::Value,
    pub(crate) time_spent: i64,
    /// Client-rendered document as a `data:...;base64,` blob. When absent
    /// the PDF is assembled server-side from the answers.
    pub(crate) document: Option<&'a str>,
}

#[derive(Debug)]
pub(crate) struct PipelineOutcome {
    pub(crate) submission_id: i64,
    pub(crate) pdf_filename: String,
    pub(crate) relative_path: String,
    pub(crate) folder: String,
    pub(crate) pdf_size: i64,
    pub(crate) pdf_sha256: String,
    pub(crate) submitted_at: PrimitiveDateTime,
}

/// Strips the data-URL prefix and decodes the base64 body.
pub(crate) fn decode_document_payload(payload: &str) -> Result<Vec<u8>, PipelineError> {
    let encoded = match payload.split_once(";base64,") {
        Some((prefix, encoded)) if prefix.starts_with("data:") => encoded,
        _ => {
            return Err(PipelineError::InvalidPayload(
                "expected a data URL with a base64 body".to_string(),
            ))
        }
    };

    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|err| PipelineError::InvalidPayload(err.to_string()))?;

    if bytes.is_empty() {
        return Err(PipelineError::InvalidPayload("document payload is empty".to_string()));
    }

    Ok(bytes)
}

/// Turns a completed exam into a durable artifact: obtain bytes, place the
/// file, drop the advisory marker, insert the row.
///
/// Not idempotent: each call writes a new file and a new row. The expiry vs
/// manual-submit race is settled by the timer's one-shot guard before this
/// function is reached.
pub(crate) async fn finalize_submission(
    state: &AppState,
    input: SubmissionInput<'_>,
    mode: FinalizeMode,
) -> Result<PipelineOutcome, PipelineError> {
    let submitted_at = primitive_now_utc();

    let bytes = match input.document {
        Some(payload) => decode_document_payload(payload)?,
        None => pdf::assemble_submission_pdf(
            input.exam_title,
            input.exam_type,
            input.examinee_name,
            input.examinee_id,
            &format_primitive(submitted_at),
            input.answers,
        )
        .map_err(|err| PipelineError::RenderFailed(err.to_string()))?,
    };

    let stored = state
        .storage()
        .write_submission_file(
            &bytes,
            input.exam_type,
            input.examinee_name,
            input.examinee_id,
            input.exam_title,
        )
        .await
        .map_err(PipelineError::StorageWriteFailed)?;
    tracing::debug!(path = %stored.absolute_path.display(), "Submission file written");

    // Advisory state only; never fails the pipeline.
    if let Err(err) = state
        .storage()
        .remove_active_marker(input.examinee_name, input.examinee_id, input.exam_type)
        .await
    {
        tracing::warn!(
            examinee_id = %input.examinee_id,
            exam_type = %input.exam_type,
            error = %err,
            "Failed to remove active exam marker"
        );
    }

    let insert_result = repositories::submissions::insert(
        state.db(),
        repositories::submissions::NewSubmission {
            exam_type: input.exam_type,
            exam_id: input.exam_id,
            exam_title: input.exam_title,
            examinee_name: input.examinee_name,
            examinee_id: input.examinee_id,
            answers: input.answers,
            pdf_filename: &stored.filename,
            pdf_path: &stored.relative_path,
            pdf_size: stored.size,
            pdf_sha256: &stored.sha256,
            time_spent: input.time_spent,
            submitted_at,
        },
    )
    .await;

    let submission_id = match insert_result {
        Ok(id) => id,
        Err(err) => {
            // Known gap: the written file is orphaned. No compensating
            // deletion; the failure is loud instead of silent.
            tracing::error!(
                path = %stored.relative_path,
                examinee_id = %input.examinee_id,
                error = %err,
                "Orphaned submission file: database insert failed after write"
            );
            return Err(PipelineError::DatabaseFailed(err));
        }
    };

    metrics::counter!("submissions_total", "mode" => mode.label()).increment(1);
    tracing::info!(
        submission_id,
        path = %stored.relative_path,
        mode = mode.label(),
        "Submission stored"
    );

    Ok(PipelineOutcome {
        submission_id,
        pdf_filename: stored.filename,
        relative_path: stored.relative_path,
        folder: format!(
            "{STORAGE_PATH_PREFIX}/{}",
            StorageService::folder_name(input.examinee_name, input.examinee_id)
        ),
        pdf_size: stored.size,
        pdf_sha256: stored.sha256,
        submitted_at,
    })
}

/// Expiry half of the submit race: renders whatever the marker holds and
/// funnels it through the same pipeline as a manual submit. Errors can only
/// be logged here, there is no client to surface them to.
pub(crate) async fn auto_submit_expired(
    state: AppState,
    key: TimerKey,
    exam_id: i64,
    exam_title: String,
) {
    let marker = match state
        .storage()
        .read_active_marker(&key.examinee_name, &key.examinee_id, key.exam_type)
        .await
    {
        Ok(marker) => marker,
        Err(err) => {
            tracing::warn!(
                examinee_id = %key.examinee_id,
                exam_type = %key.exam_type,
                error = %err,
                "Failed to read active exam marker at expiry"
            );
            None
        }
    };

    let answers = marker.map(|marker| marker.answers).unwrap_or_else(|| serde_json::json!({}));
    let duration = state.settings().exam().duration_seconds as i64;

    let input = SubmissionInput {
        exam_type: key.exam_type,
        exam_id,
        exam_title: &exam_title,
        examinee_name: &key.examinee_name,
        examinee_id: &key.examinee_id,
        answers: &answers,
        time_spent: duration,
        document: None,
    };

    if let Err(err) = finalize_submission(&state, input, FinalizeMode::AutoExpire).await {
        tracing::error!(
            examinee_id = %key.examinee_id,
            exam_type = %key.exam_type,
            error = %err,
            "Auto-submit after expiry failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_accepts_pdf_data_url() {
        let payload = format!("data:application/pdf;base64,{}", BASE64.encode(b"%PDF-1.4 body"));
        let bytes = decode_document_payload(&payload).expect("decode");
        assert_eq!(bytes, b"%PDF-1.4 body");
    }

    #[test]
    fn decode_rejects_missing_prefix() {
        let err = decode_document_payload("JVBERi0xLjQ=").expect_err("no prefix");
        assert!(matches!(err, PipelineError::InvalidPayload(_)));
    }

    #[test]
    fn decode_rejects_malformed_base64() {
        let err = decode_document_payload("data:application/pdf;base64,@@not-base64@@")
            .expect_err("bad body");
        assert!(matches!(err, PipelineError::InvalidPayload(_)));
    }

    #[test]
    fn decode_rejects_empty_body() {
        let err = decode_document_payload("data:application/pdf;base64,").expect_err("empty");
        assert!(matches!(err, PipelineError::InvalidPayload(_)));
    }
}
