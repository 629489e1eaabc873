use axum::http::{header, Method, StatusCode};
use tower::ServiceExt;

use super::submit_exam_for;
use crate::db::types::ExamType;
use crate::test_support;

#[tokio::test]
async fn submit_stores_row_and_file_then_serves_identical_bytes() {
    let ctx = test_support::setup_test_context().await;
    let exam_id = test_support::insert_exam(&ctx.state, ExamType::Reading, "Reading Test 2").await;

    let document = b"%PDF-1.4 jane submission body";
    let submission = submit_exam_for(
        ctx.app.clone(),
        exam_id,
        "reading",
        "Jane",
        "S100",
        Some(test_support::pdf_data_url(document)),
    )
    .await;

    assert_eq!(submission["status"], "submitted");
    let pdf_path = submission["pdf_path"].as_str().expect("pdf_path");
    assert!(pdf_path.starts_with("storage/Jane_S100/reading/"), "path: {pdf_path}");
    assert!(pdf_path.ends_with(".pdf"));
    assert_eq!(submission["folder"], "storage/Jane_S100");

    let on_disk = ctx.file_on_disk(pdf_path);
    let metadata = std::fs::metadata(&on_disk).expect("stored file");
    assert!(metadata.len() > 0);
    assert_eq!(metadata.len(), submission["pdf_size"].as_u64().expect("pdf_size"));

    // Round-trip through the file-serving endpoint is byte identical.
    let filename = submission["pdf_filename"].as_str().expect("pdf_filename");
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/files/Jane_S100/reading/{filename}"),
            None,
        ))
        .await
        .expect("fetch pdf");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).and_then(|value| value.to_str().ok()),
        Some("application/pdf")
    );
    let served = test_support::read_bytes(response).await;
    assert_eq!(served, document);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, "/api/v1/submissions", None))
        .await
        .expect("list submissions");
    let status = response.status();
    let listing = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {listing}");
    assert_eq!(listing["total_count"], 1);
    assert_eq!(listing["items"][0]["examinee_id"], "S100");
    assert_eq!(listing["items"][0]["exam_type"], "reading");

    let submission_id = submission["id"].as_i64().expect("id");
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/submissions/{submission_id}"),
            None,
        ))
        .await
        .expect("get submission");
    let status = response.status();
    let fetched = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {fetched}");
    assert_eq!(fetched["pdf_path"].as_str(), Some(pdf_path));
    assert_eq!(fetched["pdf_sha256"].as_str().map(str::len), Some(64));
    assert_eq!(fetched["time_spent"], 1234);
}

#[tokio::test]
async fn submit_without_document_renders_pdf_server_side() {
    let ctx = test_support::setup_test_context().await;
    let exam_id = test_support::insert_exam(&ctx.state, ExamType::Writing, "Essay Task").await;

    let submission =
        submit_exam_for(ctx.app.clone(), exam_id, "writing", "Bob", "S200", None).await;

    let pdf_path = submission["pdf_path"].as_str().expect("pdf_path");
    assert!(pdf_path.starts_with("storage/Bob_S200/writing/"));

    let bytes = std::fs::read(ctx.file_on_disk(pdf_path)).expect("rendered file");
    assert!(bytes.starts_with(b"%PDF-"));
}

#[tokio::test]
async fn submit_rejects_malformed_document_payload() {
    let ctx = test_support::setup_test_context().await;
    let exam_id = test_support::insert_exam(&ctx.state, ExamType::Reading, "Reading Test").await;

    for document in ["data:application/pdf;base64,@@not-base64@@", "JVBERi0xLjQ="] {
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/submissions",
                Some(test_support::submit_payload(
                    "reading",
                    exam_id,
                    "Jane",
                    "S100",
                    Some(document.to_string()),
                )),
            ))
            .await
            .expect("submit");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // Nothing was persisted on either side.
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, "/api/v1/submissions", None))
        .await
        .expect("list");
    let listing = test_support::read_json(response).await;
    assert_eq!(listing["total_count"], 0);
    assert!(!ctx.storage_root.join("Jane_S100").exists());
}

#[tokio::test]
async fn submit_rejects_invalid_examinee_identity() {
    let ctx = test_support::setup_test_context().await;
    let exam_id = test_support::insert_exam(&ctx.state, ExamType::Reading, "Reading Test").await;

    for (name, id) in [("Jane", "S_100"), ("Jane", ""), ("a/b", "S100"), ("..", "S100")] {
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/submissions",
                Some(test_support::submit_payload("reading", exam_id, name, id, None)),
            ))
            .await
            .expect("submit");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "name={name} id={id}");
    }
}

#[tokio::test]
async fn file_endpoint_rejects_bad_segments() {
    let ctx = test_support::setup_test_context().await;

    for uri in [
        "/api/v1/files/NoUnderscoreFolder/reading/a.pdf",
        "/api/v1/files/Jane_S100/speaking/a.pdf",
        "/api/v1/files/Jane_S100/reading/.active_exam.json",
    ] {
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(Method::GET, uri, None))
            .await
            .expect("fetch");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri: {uri}");
    }

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/files/Jane_S100/reading/missing.pdf",
            None,
        ))
        .await
        .expect("fetch missing");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
