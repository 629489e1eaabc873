use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::api;
use crate::core::{config::Settings, state::AppState, time::primitive_now_utc};
use crate::db::types::ExamType;
use crate::repositories;
use crate::services::storage::StorageService;

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    pub(crate) storage_root: PathBuf,
    _guard: OwnedMutexGuard<()>,
}

impl TestContext {
    /// Maps a stored relative path (`storage/...`) onto the test root.
    pub(crate) fn file_on_disk(&self, relative_path: &str) -> PathBuf {
        let rest = relative_path.strip_prefix("storage/").expect("storage-prefixed path");
        self.storage_root.join(rest)
    }
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env(base: &Path) {
    std::env::set_var("EXAMDESK_ENV", "test");
    std::env::set_var("EXAMDESK_STRICT_CONFIG", "0");
    std::env::set_var(
        "DATABASE_URL",
        format!("sqlite://{}", base.join("examdesk_test.db").display()),
    );
    std::env::set_var("STORAGE_ROOT", base.join("storage").display().to_string());
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    std::env::set_var("EXAM_DURATION_SECONDS", "3600");
    std::env::set_var("EXAM_WARNING_THRESHOLD_SECONDS", "600");
    std::env::remove_var("BACKEND_CORS_ORIGINS");
    std::env::remove_var("PROJECT_NAME");
}

pub(crate) async fn setup_test_context() -> TestContext {
    let guard = env_lock().await;

    let base = std::env::temp_dir().join(format!("examdesk-test-{}", Uuid::new_v4().simple()));
    std::fs::create_dir_all(&base).expect("test base dir");
    set_test_env(&base);

    let settings = Settings::load().expect("settings");
    let db = crate::db::init_pool(&settings).await.expect("db pool");
    crate::db::run_migrations(&db).await.expect("migrations");

    let storage = StorageService::from_settings(&settings);
    storage.ensure_root().await.expect("storage root");
    let storage_root = PathBuf::from(&settings.storage().root);

    let state = AppState::new(settings, db, storage);
    let app = api::router::router(state.clone());

    TestContext { state, app, storage_root, _guard: guard }
}

pub(crate) async fn insert_exam(state: &AppState, exam_type: ExamType, title: &str) -> i64 {
    repositories::exams::create(
        state.db(),
        repositories::exams::NewExam {
            exam_type,
            title,
            content: &serde_json::json!({"sections": []}),
            created_at: primitive_now_utc(),
        },
    )
    .await
    .expect("insert exam")
}

pub(crate) fn pdf_data_url(bytes: &[u8]) -> String {
    format!("data:application/pdf;base64,{}", BASE64.encode(bytes))
}

pub(crate) fn submit_payload(
    exam_type: &str,
    exam_id: i64,
    examinee_name: &str,
    examinee_id: &str,
    document: Option<String>,
) -> serde_json::Value {
    let mut payload = serde_json::json!({
        "exam_type": exam_type,
        "exam_id": exam_id,
        "exam_title": "Sample Exam",
        "examinee_name": examinee_name,
        "examinee_id": examinee_id,
        "answers": {"q1": "answer one", "q2": "answer two"},
        "time_spent": 1234,
    });
    if let Some(document) = document {
        payload["document"] = serde_json::Value::String(document);
    }
    payload
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) fn multipart_request(
    uri: &str,
    field_filename: &str,
    content_type: &str,
    bytes: &[u8],
) -> Request<Body> {
    let boundary = "examdesk-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{field_filename}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .expect("multipart request")
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}

pub(crate) async fn read_bytes(response: axum::response::Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.expect("response body").to_vec()
}
