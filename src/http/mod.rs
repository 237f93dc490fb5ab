//! HTTP adapter.
//!
//! A thin axum layer over [`ClassbookService`]. Handlers build a
//! [`CallContext`] from the `X-User-Id` / `X-User-Cargo` headers, run the
//! service call on the blocking pool (the store holds a synchronous
//! connection lock), and map [`Error`] kinds onto status codes with a
//! `{"error": ..., "kind": ...}` body.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | GET | `/health` | liveness |
//! | GET | `/authorize?role=&capability=` | role query |
//! | GET | `/roles` | role table |
//! | GET | `/reports/{kind}` | report, filters as query parameters |
//! | GET | `/classes/{id}/attendance-sheet?date=` | roll-call sheet |
//! | PUT | `/classes/{id}/attendance` | batch attendance replace |
//! | POST | `/students`, `/teachers`, `/classes`, `/enrollments`, `/grades`, `/attendance` | create |
//! | DELETE | `/students/{id}`, `/classes/{id}` | delete |

use crate::models::{
    AttendanceBatch, AttendanceEntry, NewAttendance, NewClass, NewEnrollment, NewGrade,
    NewStudent, NewTeacher, ReportKind, ReportRequest, parse_date,
};
use crate::security::{CallContext, HeaderSource};
use crate::services::ClassbookService;
use crate::{Error, Result};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// Header carrying an upstream correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    service: Arc<ClassbookService>,
    default_rank_limit: usize,
}

impl AppState {
    /// Creates the state.
    #[must_use]
    pub const fn new(service: Arc<ClassbookService>, default_rank_limit: usize) -> Self {
        Self {
            service,
            default_rank_limit,
        }
    }
}

impl HeaderSource for HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|value| value.to_str().ok())
    }
}

fn call_context(headers: &HeaderMap) -> CallContext {
    let ctx = CallContext::from_headers(headers);
    match headers.header(REQUEST_ID_HEADER).filter(|id| !id.trim().is_empty()) {
        Some(id) => ctx.with_request_id(id.trim()),
        None => ctx,
    }
}

/// Error wrapper rendering the `{error, kind}` body.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        (
            status,
            Json(serde_json::json!({
                "error": self.0.to_string(),
                "kind": self.0.kind().as_str(),
            })),
        )
            .into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Runs a service call for the request on the blocking pool.
async fn run_blocking<T, F>(state: &AppState, headers: &HeaderMap, call: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&ClassbookService, &mut CallContext) -> Result<T> + Send + 'static,
{
    let service = Arc::clone(&state.service);
    let mut ctx = call_context(headers);
    tokio::task::spawn_blocking(move || call(&service, &mut ctx))
        .await
        .map_err(|err| Error::OperationFailed {
            operation: "run_blocking".to_string(),
            cause: err.to_string(),
        })?
        .map_err(ApiError)
}

fn created(id: i64) -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::CREATED, Json(serde_json::json!({ "id": id })))
}

/// Builds the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/authorize", get(authorize))
        .route("/roles", get(roles))
        .route("/reports/{kind}", get(report))
        .route("/classes/{id}/attendance-sheet", get(attendance_sheet))
        .route("/classes/{id}/attendance", put(replace_attendance))
        .route("/students", post(create_student))
        .route("/students/{id}", delete(delete_student))
        .route("/teachers", post(create_teacher))
        .route("/classes", post(create_class))
        .route("/classes/{id}", delete(delete_class))
        .route("/enrollments", post(create_enrollment))
        .route("/grades", post(create_grade))
        .route("/attendance", post(record_attendance))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            header::HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            header::HeaderValue::from_static("no-store"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds `addr` and serves until the process is stopped.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if binding or serving fails.
pub async fn serve(state: AppState, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::OperationFailed {
            operation: "bind".to_string(),
            cause: e.to_string(),
        })?;
    tracing::info!(addr, "Starting classbook HTTP adapter");

    axum::serve(listener, router(state))
        .await
        .map_err(|e| Error::OperationFailed {
            operation: "serve".to_string(),
            cause: e.to_string(),
        })
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct AuthorizeQuery {
    #[serde(default)]
    role: String,
    #[serde(default)]
    capability: String,
}

async fn authorize(
    State(state): State<AppState>,
    Query(query): Query<AuthorizeQuery>,
) -> impl IntoResponse {
    Json(state.service.authorize(&query.role, &query.capability))
}

async fn roles(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.roles())
}

async fn report(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let kind = ReportKind::parse(&kind)?;
    let request = ReportRequest::from_query(kind, &params, state.default_rank_limit)?;
    let report = run_blocking(&state, &headers, move |service, ctx| {
        service.report(ctx, &request)
    })
    .await?;
    Ok(Json(report))
}

async fn attendance_sheet(
    State(state): State<AppState>,
    Path(class_id): Path<i64>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let date = params
        .get("date")
        .or_else(|| params.get("data"))
        .ok_or_else(|| Error::InvalidInput("date is required".to_string()))?;
    let date = parse_date(date)?;
    let sheet = run_blocking(&state, &headers, move |service, ctx| {
        service.attendance_sheet(ctx, class_id, date)
    })
    .await?;
    Ok(Json(sheet))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchBody {
    date: chrono::NaiveDate,
    entries: Vec<AttendanceEntry>,
}

async fn replace_attendance(
    State(state): State<AppState>,
    Path(class_id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<BatchBody>,
) -> ApiResult<impl IntoResponse> {
    let batch = AttendanceBatch {
        class_id,
        date: body.date,
        entries: body.entries,
    };
    let replaced = run_blocking(&state, &headers, move |service, ctx| {
        service.replace_attendance(ctx, &batch)
    })
    .await?;
    Ok(Json(serde_json::json!({ "replaced": replaced })))
}

async fn create_student(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewStudent>,
) -> ApiResult<impl IntoResponse> {
    let id = run_blocking(&state, &headers, move |service, ctx| {
        service.create_student(ctx, &body)
    })
    .await?;
    Ok(created(id))
}

async fn delete_student(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    run_blocking(&state, &headers, move |service, ctx| service.delete_student(ctx, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_teacher(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewTeacher>,
) -> ApiResult<impl IntoResponse> {
    let id = run_blocking(&state, &headers, move |service, ctx| {
        service.create_teacher(ctx, &body)
    })
    .await?;
    Ok(created(id))
}

async fn create_class(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewClass>,
) -> ApiResult<impl IntoResponse> {
    let id = run_blocking(&state, &headers, move |service, ctx| {
        service.create_class(ctx, &body)
    })
    .await?;
    Ok(created(id))
}

async fn delete_class(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    run_blocking(&state, &headers, move |service, ctx| service.delete_class(ctx, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_enrollment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewEnrollment>,
) -> ApiResult<impl IntoResponse> {
    let id = run_blocking(&state, &headers, move |service, ctx| {
        service.create_enrollment(ctx, &body)
    })
    .await?;
    Ok(created(id))
}

async fn create_grade(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewGrade>,
) -> ApiResult<impl IntoResponse> {
    let id = run_blocking(&state, &headers, move |service, ctx| {
        service.create_grade(ctx, &body)
    })
    .await?;
    Ok(created(id))
}

async fn record_attendance(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewAttendance>,
) -> ApiResult<impl IntoResponse> {
    let id = run_blocking(&state, &headers, move |service, ctx| {
        service.record_attendance(ctx, &body)
    })
    .await?;
    Ok(created(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_map_source() {
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", "7".parse().unwrap());
        headers.insert("x-user-cargo", "professor".parse().unwrap());
        let ctx = call_context(&headers);
        assert_eq!(ctx.claimed_user_id(), Some("7"));
        assert_eq!(ctx.claimed_role(), Some("professor"));
    }

    #[test]
    fn test_request_id_is_propagated() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, "abc-123".parse().unwrap());
        assert_eq!(call_context(&headers).request_id(), "abc-123");
    }

    #[test]
    fn test_api_error_status() {
        let response = ApiError(Error::Conflict("dup".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let response = ApiError(Error::InvalidInput("bad".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
