use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::ExamType;

/// One persisted exam attempt. Immutable after insert except for deletion.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct Submission {
    pub(crate) id: i64,
    pub(crate) exam_type: ExamType,
    pub(crate) exam_id: i64,
    pub(crate) exam_title: String,
    pub(crate) examinee_name: String,
    pub(crate) examinee_id: String,
    pub(crate) answers: Json<serde_json::Value>,
    pub(crate) pdf_filename: String,
    pub(crate) pdf_path: String,
    pub(crate) pdf_size: i64,
    pub(crate) pdf_sha256: String,
    pub(crate) time_spent: i64,
    pub(crate) submitted_at: PrimitiveDateTime,
}

/// An authored question set. `content` is opaque to the server.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct Exam {
    pub(crate) id: i64,
    pub(crate) exam_type: ExamType,
    pub(crate) title: String,
    pub(crate) content: Json<serde_json::Value>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}
