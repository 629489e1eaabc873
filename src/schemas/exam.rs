use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::Exam;
use crate::db::types::ExamType;

pub(crate) use crate::core::time::format_primitive;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamCreateRequest {
    pub(crate) exam_type: ExamType,
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub(crate) title: String,
    pub(crate) content: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamResponse {
    pub(crate) id: i64,
    pub(crate) exam_type: ExamType,
    pub(crate) title: String,
    pub(crate) content: serde_json::Value,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl From<Exam> for ExamResponse {
    fn from(exam: Exam) -> Self {
        Self {
            id: exam.id,
            exam_type: exam.exam_type,
            title: exam.title,
            content: exam.content.0,
            created_at: format_primitive(exam.created_at),
            updated_at: format_primitive(exam.updated_at),
        }
    }
}
