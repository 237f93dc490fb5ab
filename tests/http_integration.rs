//! HTTP adapter tests driven through the router without a socket.

#![cfg(feature = "http")]
// Integration tests use expect/unwrap for simplicity
#![allow(clippy::expect_used, clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use classbook::http::{AppState, router};
use classbook::observability::current_request_id;
use classbook::security::{CallContext, Stage};
use classbook::{
    AuthorizationGuard, ClassbookService, Operation, Pipeline, RecordStore, RoleCapabilityTable,
    SqliteRecordStore,
};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

fn app() -> axum::Router {
    let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::in_memory().unwrap());
    let service = ClassbookService::new(Arc::new(RoleCapabilityTable::standard()), store);
    router(AppState::new(Arc::new(service), 10))
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str, role: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(role) = role {
        builder = builder.header("x-user-id", "1").header("x-user-cargo", role);
    }
    builder.body(Body::empty()).unwrap()
}

fn post(uri: &str, role: &str, body: &serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header("x-user-id", "1")
        .header("x-user-cargo", role)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_authorize_endpoint() {
    let app = app();
    let (status, body) = send(&app, get("/authorize?role=professor&capability=create_notas", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], true);

    let (_, body) = send(&app, get("/authorize?role=professor&capability=view_relatorios", None)).await;
    assert_eq!(body["allowed"], false);
}

#[tokio::test]
async fn test_report_status_codes() {
    let app = app();

    let (status, body) = send(&app, get("/reports/ranking", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthenticated");

    let (status, body) = send(&app, get("/reports/ranking", Some("professor"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "forbidden");

    let (status, body) = send(&app, get("/reports/ranking?limite=abc", Some("diretor"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation_error");

    let (status, body) = send(&app, get("/reports/desempenho_turmas", Some("coordenador"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "class_performance");
}

#[tokio::test]
async fn test_grade_flow_and_conflict() {
    let app = app();

    let (status, body) = send(&app, post("/students", "secretaria", &serde_json::json!({"name": "Ana"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let student_id = body["id"].as_i64().unwrap();

    let (_, body) = send(&app, post("/classes", "coordenador", &serde_json::json!({"name": "1A"}))).await;
    let class_id = body["id"].as_i64().unwrap();

    let (_, body) = send(
        &app,
        post(
            "/enrollments",
            "coordenador",
            &serde_json::json!({"studentId": student_id, "classId": class_id}),
        ),
    )
    .await;
    let enrollment_id = body["id"].as_i64().unwrap();

    let grade = serde_json::json!({
        "enrollmentId": enrollment_id,
        "subject": "Math",
        "grade": 8.0,
        "bimester": 1
    });
    let (status, _) = send(&app, post("/grades", "professor", &grade)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, post("/grades", "professor", &grade)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");

    let (status, _) = send(&app, get(&format!("/reports/report-card?student_id={student_id}"), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        get(&format!("/reports/report-card?student_id={student_id}"), Some("professor")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["grades"][0]["subject"], "Math");
}

#[tokio::test]
async fn test_missing_records() {
    let app = app();

    let (status, body) = send(&app, get("/classes/42/attendance-sheet?date=2024-03-11", Some("professor"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");

    let request = Request::delete("/students/42")
        .header("x-user-id", "1")
        .header("x-user-cargo", "admin")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

struct SeenRequestIds(Arc<Mutex<Vec<Option<String>>>>);

impl Stage for SeenRequestIds {
    fn name(&self) -> &'static str {
        "seen_request_ids"
    }

    fn process(&self, _ctx: &mut CallContext, _operation: Operation) -> classbook::Result<()> {
        self.0.lock().unwrap().push(current_request_id());
        Ok(())
    }
}

#[tokio::test]
async fn test_request_id_reaches_the_executing_thread() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let table = Arc::new(RoleCapabilityTable::standard());
    let pipeline = Pipeline::standard(AuthorizationGuard::new(Arc::clone(&table)))
        .with_stage(SeenRequestIds(Arc::clone(&seen)));
    let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::in_memory().unwrap());
    let service = ClassbookService::new(table, store).with_pipeline(pipeline);
    let app = router(AppState::new(Arc::new(service), 10));

    let request = Request::get("/reports/overview")
        .header("x-user-id", "1")
        .header("x-user-cargo", "diretor")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(*seen.lock().unwrap(), vec![Some("req-42".to_string())]);
    // The handler thread is left without a context.
    assert_eq!(current_request_id(), None);
}
