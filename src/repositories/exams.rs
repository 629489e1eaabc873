use sqlx::types::Json;
use sqlx::SqlitePool;
use time::PrimitiveDateTime;

use crate::db::models::Exam;
use crate::db::types::ExamType;

pub(crate) struct NewExam<'a> {
    pub(crate) exam_type: ExamType,
    pub(crate) title: &'a str,
    pub(crate) content: &'a serde_json::Value,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn create(pool: &SqlitePool, exam: NewExam<'_>) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO exams (exam_type, title, content, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(exam.exam_type)
    .bind(exam.title)
    .bind(Json(exam.content))
    .bind(exam.created_at)
    .bind(exam.created_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn list(
    pool: &SqlitePool,
    exam_type: Option<ExamType>,
) -> Result<Vec<Exam>, sqlx::Error> {
    match exam_type {
        Some(exam_type) => {
            sqlx::query_as::<_, Exam>(
                "SELECT * FROM exams WHERE exam_type = ? ORDER BY created_at DESC, id DESC",
            )
            .bind(exam_type)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, Exam>("SELECT * FROM exams ORDER BY created_at DESC, id DESC")
                .fetch_all(pool)
                .await
        }
    }
}

pub(crate) async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>("SELECT * FROM exams WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn delete_by_id(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM exams WHERE id = ?").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}
