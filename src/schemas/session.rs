use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::types::ExamType;
use crate::services::exam_timer::TimerPhase;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct StartSessionRequest {
    pub(crate) exam_id: i64,
    #[validate(length(min = 1, max = 100, message = "examinee_name must be 1-100 characters"))]
    pub(crate) examinee_name: String,
    #[validate(length(min = 1, max = 64, message = "examinee_id must be 1-64 characters"))]
    pub(crate) examinee_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SaveDraftRequest {
    pub(crate) exam_type: ExamType,
    #[validate(length(min = 1, max = 100, message = "examinee_name must be 1-100 characters"))]
    pub(crate) examinee_name: String,
    #[validate(length(min = 1, max = 64, message = "examinee_id must be 1-64 characters"))]
    pub(crate) examinee_id: String,
    pub(crate) answers: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionQuery {
    pub(crate) examinee_name: String,
    pub(crate) examinee_id: String,
    pub(crate) exam_type: ExamType,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionStatusResponse {
    pub(crate) phase: TimerPhase,
    pub(crate) remaining_seconds: i64,
    pub(crate) warning: bool,
    pub(crate) exam_id: Option<i64>,
    pub(crate) exam_title: Option<String>,
    pub(crate) draft_answers: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StartSessionResponse {
    pub(crate) exam_id: i64,
    pub(crate) exam_type: ExamType,
    pub(crate) exam_title: String,
    pub(crate) duration_seconds: u64,
    pub(crate) remaining_seconds: i64,
    pub(crate) phase: TimerPhase,
}
