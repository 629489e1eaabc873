mod cleanup_flows;
mod full_flow;

use axum::http::{Method, StatusCode};
use axum::Router;
use tower::ServiceExt;

use crate::test_support;

pub(super) async fn submit_exam_for(
    app: Router,
    exam_id: i64,
    exam_type: &str,
    examinee_name: &str,
    examinee_id: &str,
    document: Option<String>,
) -> serde_json::Value {
    let response = app
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/submissions",
            Some(test_support::submit_payload(
                exam_type,
                exam_id,
                examinee_name,
                examinee_id,
                document,
            )),
        ))
        .await
        .expect("submit exam");

    let status = response.status();
    let json = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {json}");
    json
}
