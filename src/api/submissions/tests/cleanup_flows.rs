use axum::http::{Method, StatusCode};
use tower::ServiceExt;

use super::submit_exam_for;
use crate::db::types::ExamType;
use crate::test_support;

#[tokio::test]
async fn deleting_missing_submission_is_success() {
    let ctx = test_support::setup_test_context().await;

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::DELETE, "/api/v1/submissions/9999", None))
        .await
        .expect("delete");

    let status = response.status();
    let json = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {json}");
    assert_eq!(json["status"], "already_deleted");
}

#[tokio::test]
async fn deleting_submission_removes_file_and_prunes_folders() {
    let ctx = test_support::setup_test_context().await;
    let exam_id = test_support::insert_exam(&ctx.state, ExamType::Reading, "Reading Test").await;

    let submission = submit_exam_for(
        ctx.app.clone(),
        exam_id,
        "reading",
        "Jane",
        "S100",
        Some(test_support::pdf_data_url(b"%PDF-1.4 jane")),
    )
    .await;
    let submission_id = submission["id"].as_i64().expect("id");
    let pdf_path = submission["pdf_path"].as_str().expect("pdf_path");
    assert!(ctx.file_on_disk(pdf_path).exists());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/v1/submissions/{submission_id}"),
            None,
        ))
        .await
        .expect("delete");
    let status = response.status();
    let json = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {json}");
    assert_eq!(json["status"], "deleted");

    // Last file in the tree: both the exam-type and examinee folders prune.
    assert!(!ctx.file_on_disk(pdf_path).exists());
    assert!(!ctx.storage_root.join("Jane_S100").exists());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/submissions/{submission_id}"),
            None,
        ))
        .await
        .expect("get deleted");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_submission_with_missing_file_still_removes_row() {
    let ctx = test_support::setup_test_context().await;
    let exam_id = test_support::insert_exam(&ctx.state, ExamType::Reading, "Reading Test").await;

    let submission = submit_exam_for(
        ctx.app.clone(),
        exam_id,
        "reading",
        "Jane",
        "S100",
        Some(test_support::pdf_data_url(b"%PDF-1.4 jane")),
    )
    .await;
    let submission_id = submission["id"].as_i64().expect("id");
    let pdf_path = submission["pdf_path"].as_str().expect("pdf_path");
    std::fs::remove_file(ctx.file_on_disk(pdf_path)).expect("remove stored file");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/v1/submissions/{submission_id}"),
            None,
        ))
        .await
        .expect("delete");
    let status = response.status();
    let json = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {json}");
    assert_eq!(json["status"], "deleted");
}

#[tokio::test]
async fn deleting_examinee_removes_only_their_rows_and_tree() {
    let ctx = test_support::setup_test_context().await;
    let reading = test_support::insert_exam(&ctx.state, ExamType::Reading, "Reading Test").await;
    let writing = test_support::insert_exam(&ctx.state, ExamType::Writing, "Essay Task").await;

    submit_exam_for(
        ctx.app.clone(),
        reading,
        "reading",
        "Jane",
        "S100",
        Some(test_support::pdf_data_url(b"jane reading")),
    )
    .await;
    submit_exam_for(
        ctx.app.clone(),
        writing,
        "writing",
        "Jane",
        "S100",
        Some(test_support::pdf_data_url(b"jane writing")),
    )
    .await;
    submit_exam_for(
        ctx.app.clone(),
        reading,
        "reading",
        "Bob",
        "S200",
        Some(test_support::pdf_data_url(b"bob reading")),
    )
    .await;

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            "/api/v1/submissions/examinee/S100",
            None,
        ))
        .await
        .expect("delete examinee");
    let status = response.status();
    let json = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {json}");
    assert_eq!(json["rows_deleted"], 2);
    assert_eq!(json["folders_removed"], 1);

    assert!(!ctx.storage_root.join("Jane_S100").exists());
    assert!(ctx.storage_root.join("Bob_S200").exists());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/submissions/examinee/S100",
            None,
        ))
        .await
        .expect("list examinee");
    let listing = test_support::read_json(response).await;
    assert_eq!(listing.as_array().map(Vec::len), Some(0));

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/submissions/examinee/S200",
            None,
        ))
        .await
        .expect("list other examinee");
    let listing = test_support::read_json(response).await;
    assert_eq!(listing.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn deleting_examinee_without_folder_still_removes_rows() {
    let ctx = test_support::setup_test_context().await;
    let exam_id = test_support::insert_exam(&ctx.state, ExamType::Reading, "Reading Test").await;

    submit_exam_for(
        ctx.app.clone(),
        exam_id,
        "reading",
        "Jane",
        "S100",
        Some(test_support::pdf_data_url(b"jane reading")),
    )
    .await;

    // Folder already gone (examinee removed out of band): name resolution
    // fails, rows are still deleted, no filesystem deletion is attempted.
    std::fs::remove_dir_all(ctx.storage_root.join("Jane_S100")).expect("drop folder");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            "/api/v1/submissions/examinee/S100",
            None,
        ))
        .await
        .expect("delete examinee");
    let status = response.status();
    let json = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {json}");
    assert_eq!(json["rows_deleted"], 1);
    assert_eq!(json["folders_removed"], 0);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/submissions/examinee/S100",
            None,
        ))
        .await
        .expect("list examinee");
    let listing = test_support::read_json(response).await;
    assert_eq!(listing.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn delete_all_preserves_protected_asset_folders() {
    let ctx = test_support::setup_test_context().await;
    let reading = test_support::insert_exam(&ctx.state, ExamType::Reading, "Reading Test").await;

    submit_exam_for(
        ctx.app.clone(),
        reading,
        "reading",
        "Jane",
        "S100",
        Some(test_support::pdf_data_url(b"jane")),
    )
    .await;
    submit_exam_for(
        ctx.app.clone(),
        reading,
        "reading",
        "Bob",
        "S200",
        Some(test_support::pdf_data_url(b"bob")),
    )
    .await;

    let audio_file = ctx.storage_root.join("audio_uploads").join("clip.mp3");
    std::fs::write(&audio_file, b"RIFF").expect("seed audio asset");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::DELETE, "/api/v1/submissions", None))
        .await
        .expect("delete all");
    let status = response.status();
    let json = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {json}");
    assert_eq!(json["rows_deleted"], 2);
    assert_eq!(json["folders_removed"], 2);

    assert!(audio_file.exists());
    assert!(ctx.storage_root.join("image_uploads").exists());
    assert!(!ctx.storage_root.join("Jane_S100").exists());
    assert!(!ctx.storage_root.join("Bob_S200").exists());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, "/api/v1/submissions", None))
        .await
        .expect("list");
    let listing = test_support::read_json(response).await;
    assert_eq!(listing["total_count"], 0);
}
