//! Dashboard HTTP routes — webhook ingestion and the read API.

pub mod api;
pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::DashboardConfig;
use crate::services::github_service::JobSource;
use crate::store::PipelineStore;

/// Headroom on top of the job fetch timeout for the datastore round-trips.
const REQUEST_TIMEOUT_SLACK: Duration = Duration::from_secs(30);

/// Shared state for dashboard route handlers.
#[derive(Clone)]
pub struct DashboardState {
    pub store: Arc<dyn PipelineStore>,
    pub jobs: Arc<dyn JobSource>,
    pub config: DashboardConfig,
}

/// Build the dashboard's Axum router.
pub fn dashboard_router(state: DashboardState) -> Router {
    let request_timeout = state.config.job_fetch_timeout + REQUEST_TIMEOUT_SLACK;

    Router::new()
        // Webhook
        .route("/webhook", post(webhook_handler))
        // Read API
        .route("/api/pipelines", get(list_pipelines_handler))
        .route("/api/pipelines/details", get(pipeline_detail_handler))
        .with_state(state)
        .layer(request_timeout_layer(request_timeout))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE]),
        )
        .layer(TraceLayer::new_for_http())
}

/// Requests running past `timeout` are answered with 408.
fn request_timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

// ── Webhook ──

async fn webhook_handler(
    State(state): State<DashboardState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), webhook::WebhookError> {
    webhook::handle_webhook(&state, &headers, &body)
        .await
        .map(|outcome| (StatusCode::OK, outcome.message()))
}

// ── Read API ──

async fn list_pipelines_handler(State(state): State<DashboardState>) -> Response {
    match api::list_pipelines(state.store.as_ref()).await {
        Ok(items) => Json(items).into_response(),
        Err(e) => {
            tracing::error!("Failed to list pipelines: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch pipelines")
        }
    }
}

#[derive(serde::Deserialize)]
pub struct DetailQuery {
    pub id: Option<String>,
}

async fn pipeline_detail_handler(
    State(state): State<DashboardState>,
    Query(query): Query<DetailQuery>,
) -> Response {
    let Some(raw_id) = query.id.filter(|id| !id.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing pipeline id");
    };
    let Ok(run_id) = raw_id.parse::<i64>() else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid pipeline id");
    };

    match api::get_pipeline_detail(state.store.as_ref(), run_id).await {
        Ok(detail) => Json(detail).into_response(),
        Err(api::DetailError::NotFound(_)) => {
            error_response(StatusCode::NOT_FOUND, "Pipeline not found")
        }
        Err(api::DetailError::Store(e)) => {
            tracing::error!(run_id, "Failed to fetch pipeline detail: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
    }
}
