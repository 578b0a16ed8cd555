// HTTP API
//
// Every report route takes a merchant name and an MM-YYYY month. Reports run on
// the blocking pool under the configured request timeout.
//   200 report
//   400 malformed month
//   404 report is empty
//   500 store or decode failure
//   504 timeout

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::calendar::Month;
use crate::error::Result;
use crate::reports::{MetricsEngine, Report};

pub const NO_DATA: &str = "no data found for merchant and month";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MetricsEngine>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(engine: MetricsEngine, request_timeout: Duration) -> Self {
        Self {
            engine: Arc::new(engine),
            request_timeout,
        }
    }
}

/// API Response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::err(message))).into_response()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/summary/:merchant/:month - Member counts with variations
async fn month_summary(
    State(state): State<AppState>,
    Path((merchant, month)): Path<(String, String)>,
) -> Response {
    run_report(state, &month, move |engine, month| engine.month_summary(&merchant, month)).await
}

/// GET /api/collections/:merchant/:month - Collections per day
async fn daily_collections(
    State(state): State<AppState>,
    Path((merchant, month)): Path<(String, String)>,
) -> Response {
    run_report(state, &month, move |engine, month| engine.daily_collections(&merchant, month)).await
}

/// GET /api/collections/summary/:merchant/:month - Collected totals with variations
async fn collections_summary(
    State(state): State<AppState>,
    Path((merchant, month)): Path<(String, String)>,
) -> Response {
    run_report(state, &month, move |engine, month| engine.collections_summary(&merchant, month)).await
}

/// GET /api/revenue-share/:merchant/:month - Revenue percentages by cadence and tier
async fn revenue_share(
    State(state): State<AppState>,
    Path((merchant, month)): Path<(String, String)>,
) -> Response {
    run_report(state, &month, move |engine, month| engine.revenue_share(&merchant, month)).await
}

async fn run_report<R, F>(state: AppState, raw_month: &str, build: F) -> Response
where
    R: Report + Serialize + Send + 'static,
    F: FnOnce(&MetricsEngine, Month) -> Result<R> + Send + 'static,
{
    let month = match Month::parse(raw_month) {
        Ok(month) => month,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let engine = state.engine.clone();
    let task = tokio::task::spawn_blocking(move || build(engine.as_ref(), month));

    match tokio::time::timeout(state.request_timeout, task).await {
        Err(_) => {
            tracing::warn!(month = %month, timeout_ms = state.request_timeout.as_millis() as u64, "report timed out");
            error_response(StatusCode::GATEWAY_TIMEOUT, "report timed out")
        }
        Ok(Err(join_error)) => {
            tracing::error!(error = %join_error, "report task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "report task failed")
        }
        Ok(Ok(Err(e))) if e.is_client_error() => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        Ok(Ok(Err(e))) => {
            tracing::error!(error = %e, month = %month, "report failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Ok(Ok(Ok(report))) if report.is_empty() => error_response(StatusCode::NOT_FOUND, NO_DATA),
        Ok(Ok(Ok(report))) => (StatusCode::OK, Json(ApiResponse::ok(report))).into_response(),
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/summary/:merchant/:month", get(month_summary))
        .route("/collections/summary/:merchant/:month", get(collections_summary))
        .route("/collections/:merchant/:month", get(daily_collections))
        .route("/revenue-share/:merchant/:month", get(revenue_share))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
