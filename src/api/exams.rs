use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::ExamType;
use crate::repositories;
use crate::schemas::exam::{ExamCreateRequest, ExamResponse};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_exam).get(list_exams))
        .route("/:exam_id", get(get_exam).delete(delete_exam))
}

#[derive(Debug, Deserialize)]
struct ListExamsQuery {
    #[serde(default)]
    exam_type: Option<ExamType>,
}

async fn create_exam(
    State(state): State<AppState>,
    Json(payload): Json<ExamCreateRequest>,
) -> Result<Json<ExamResponse>, ApiError> {
    payload.validate().map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let now = primitive_now_utc();
    let exam_id = repositories::exams::create(
        state.db(),
        repositories::exams::NewExam {
            exam_type: payload.exam_type,
            title: &payload.title,
            content: &payload.content,
            created_at: now,
        },
    )
    .await
    .map_err(|err| ApiError::internal(err, "Failed to create exam"))?;

    let exam = repositories::exams::find_by_id(state.db(), exam_id)
        .await
        .map_err(|err| ApiError::internal(err, "Failed to fetch created exam"))?
        .ok_or_else(|| ApiError::Internal("Exam missing after creation".to_string()))?;

    tracing::info!(exam_id, exam_type = %exam.exam_type, "Exam created");
    Ok(Json(exam.into()))
}

async fn list_exams(
    State(state): State<AppState>,
    Query(query): Query<ListExamsQuery>,
) -> Result<Json<Vec<ExamResponse>>, ApiError> {
    let exams = repositories::exams::list(state.db(), query.exam_type)
        .await
        .map_err(|err| ApiError::internal(err, "Failed to list exams"))?;

    Ok(Json(exams.into_iter().map(ExamResponse::from).collect()))
}

async fn get_exam(
    Path(exam_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<ExamResponse>, ApiError> {
    let exam = repositories::exams::find_by_id(state.db(), exam_id)
        .await
        .map_err(|err| ApiError::internal(err, "Failed to fetch exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;

    Ok(Json(exam.into()))
}

async fn delete_exam(
    Path(exam_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = repositories::exams::delete_by_id(state.db(), exam_id)
        .await
        .map_err(|err| ApiError::internal(err, "Failed to delete exam"))?;

    let status = if deleted { "deleted" } else { "already_deleted" };
    Ok(Json(serde_json::json!({ "status": status, "exam_id": exam_id })))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::test_support;

    #[tokio::test]
    async fn exam_crud_flow() {
        let ctx = test_support::setup_test_context().await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/exams",
                Some(json!({
                    "exam_type": "reading",
                    "title": "Reading Test 2",
                    "content": {"passages": [{"title": "P1", "questions": []}]},
                })),
            ))
            .await
            .expect("create exam");
        let status = response.status();
        let created = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::OK, "response: {created}");
        let exam_id = created["id"].as_i64().expect("id");

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                "/api/v1/exams?exam_type=reading",
                None,
            ))
            .await
            .expect("list exams");
        let listing = test_support::read_json(response).await;
        assert_eq!(listing.as_array().map(Vec::len), Some(1));
        assert_eq!(listing[0]["title"], "Reading Test 2");

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                "/api/v1/exams?exam_type=writing",
                None,
            ))
            .await
            .expect("list filtered");
        let listing = test_support::read_json(response).await;
        assert_eq!(listing.as_array().map(Vec::len), Some(0));

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::DELETE,
                &format!("/api/v1/exams/{exam_id}"),
                None,
            ))
            .await
            .expect("delete exam");
        let deleted = test_support::read_json(response).await;
        assert_eq!(deleted["status"], "deleted");

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/v1/exams/{exam_id}"),
                None,
            ))
            .await
            .expect("get deleted exam");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::DELETE,
                &format!("/api/v1/exams/{exam_id}"),
                None,
            ))
            .await
            .expect("re-delete exam");
        let deleted = test_support::read_json(response).await;
        assert_eq!(deleted["status"], "already_deleted");
    }

    #[tokio::test]
    async fn create_exam_rejects_blank_title() {
        let ctx = test_support::setup_test_context().await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/exams",
                Some(json!({"exam_type": "reading", "title": "", "content": {}})),
            ))
            .await
            .expect("create exam");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
