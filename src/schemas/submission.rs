use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::Submission;
use crate::db::types::ExamType;
use crate::services::storage::{StorageService, STORAGE_PATH_PREFIX};

pub(crate) use crate::core::time::format_primitive;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubmitExamRequest {
    pub(crate) exam_type: ExamType,
    pub(crate) exam_id: i64,
    #[validate(length(min = 1, max = 200, message = "exam_title must be 1-200 characters"))]
    pub(crate) exam_title: String,
    #[validate(length(min = 1, max = 100, message = "examinee_name must be 1-100 characters"))]
    pub(crate) examinee_name: String,
    #[validate(length(min = 1, max = 64, message = "examinee_id must be 1-64 characters"))]
    pub(crate) examinee_id: String,
    pub(crate) answers: serde_json::Value,
    #[validate(range(min = 0, message = "time_spent must be non-negative"))]
    pub(crate) time_spent: i64,
    /// Client-rendered document as a `data:...;base64,` blob; omitted when
    /// the server should render the PDF itself.
    #[serde(default)]
    pub(crate) document: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionResponse {
    pub(crate) id: i64,
    pub(crate) exam_type: ExamType,
    pub(crate) exam_id: i64,
    pub(crate) exam_title: String,
    pub(crate) examinee_name: String,
    pub(crate) examinee_id: String,
    pub(crate) answers: serde_json::Value,
    pub(crate) pdf_filename: String,
    pub(crate) pdf_path: String,
    pub(crate) pdf_size: i64,
    pub(crate) pdf_sha256: String,
    pub(crate) folder: String,
    pub(crate) time_spent: i64,
    pub(crate) submitted_at: String,
}

impl From<Submission> for SubmissionResponse {
    fn from(submission: Submission) -> Self {
        let folder = format!(
            "{STORAGE_PATH_PREFIX}/{}",
            StorageService::folder_name(&submission.examinee_name, &submission.examinee_id)
        );
        Self {
            id: submission.id,
            exam_type: submission.exam_type,
            exam_id: submission.exam_id,
            exam_title: submission.exam_title,
            examinee_name: submission.examinee_name,
            examinee_id: submission.examinee_id,
            answers: submission.answers.0,
            pdf_filename: submission.pdf_filename,
            pdf_path: submission.pdf_path,
            pdf_size: submission.pdf_size,
            pdf_sha256: submission.pdf_sha256,
            folder,
            time_spent: submission.time_spent,
            submitted_at: format_primitive(submission.submitted_at),
        }
    }
}
