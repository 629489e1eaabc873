use sqlx::types::Json;
use sqlx::SqlitePool;
use time::PrimitiveDateTime;

use crate::db::models::Submission;
use crate::db::types::ExamType;

pub(crate) struct NewSubmission<'a> {
    pub(crate) exam_type: ExamType,
    pub(crate) exam_id: i64,
    pub(crate) exam_title: &'a str,
    pub(crate) examinee_name: &'a str,
    pub(crate) examinee_id: &'a str,
    pub(crate) answers: &'a serde_json::Value,
    pub(crate) pdf_filename: &'a str,
    pub(crate) pdf_path: &'a str,
    pub(crate) pdf_size: i64,
    pub(crate) pdf_sha256: &'a str,
    pub(crate) time_spent: i64,
    pub(crate) submitted_at: PrimitiveDateTime,
}

pub(crate) async fn insert(
    pool: &SqlitePool,
    submission: NewSubmission<'_>,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO submissions (
            exam_type, exam_id, exam_title, examinee_name, examinee_id,
            answers, pdf_filename, pdf_path, pdf_size, pdf_sha256,
            time_spent, submitted_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(submission.exam_type)
    .bind(submission.exam_id)
    .bind(submission.exam_title)
    .bind(submission.examinee_name)
    .bind(submission.examinee_id)
    .bind(Json(submission.answers))
    .bind(submission.pdf_filename)
    .bind(submission.pdf_path)
    .bind(submission.pdf_size)
    .bind(submission.pdf_sha256)
    .bind(submission.time_spent)
    .bind(submission.submitted_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id(
    pool: &SqlitePool,
    id: i64,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>("SELECT * FROM submissions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list(
    pool: &SqlitePool,
    skip: i64,
    limit: i64,
) -> Result<Vec<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(
        "SELECT * FROM submissions
         ORDER BY submitted_at DESC, id DESC
         LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(skip)
    .fetch_all(pool)
    .await
}

pub(crate) async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM submissions").fetch_one(pool).await
}

pub(crate) async fn list_by_examinee(
    pool: &SqlitePool,
    examinee_id: &str,
) -> Result<Vec<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(
        "SELECT * FROM submissions
         WHERE examinee_id = ?
         ORDER BY submitted_at DESC, id DESC",
    )
    .bind(examinee_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn delete_by_id(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM submissions WHERE id = ?").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn delete_by_examinee(
    pool: &SqlitePool,
    examinee_id: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM submissions WHERE examinee_id = ?")
        .bind(examinee_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn delete_all(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM submissions").execute(pool).await?;
    Ok(result.rows_affected())
}
