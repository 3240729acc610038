//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/keywords/research` | Composite analysis of one keyword |
//! | `GET`  | `/keywords/metrics?keyword=` | Latest metrics record or `null` |
//! | `GET`  | `/keywords/trends?keyword=` | Trend points (oldest first) or `null` |
//! | `GET`  | `/keywords/related?keyword=` | Related terms by relevance or `null` |
//! | `GET`  | `/keywords/tags?keyword=` | Tag suggestions by frequency or `null` |
//! | `POST` | `/keywords/bulk-research` | Breadth-first research from a seed |
//! | `GET`  | `/keywords/history` | Search history, newest first |
//! | `DELETE` | `/keywords/history` | Clear one keyword (`?keyword=`) or everything |
//! | `DELETE` | `/keywords/cache` | Clear cached reports |
//! | `GET`  | `/settings/api-keys` | Masked credential status |
//! | `POST` | `/settings/api-keys` | Update credentials |
//! | `POST` | `/settings/api-keys/test` | Check credentials against the vendor |
//! | `POST` | `/settings/api-keys/disconnect` | Clear credentials |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "keyword must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `internal` (500). Malformed JSON bodies and
//! query strings are reported as `bad_request`.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use keyword_scout_core::models::{KeywordRecord, MetricsRecord, RelatedTerm, TagSuggestion, TrendPoint};
use keyword_scout_core::report::KeywordAnalysisResponse;

use crate::app::AppContext;
use crate::bulk::{BulkRequest, BulkResponse};
use crate::credentials::{CredentialCheck, CredentialStatus, CredentialUpdate};
use crate::error::ResearchError;
use crate::research::ResearchOptions;

const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Clone)]
struct AppState {
    ctx: Arc<AppContext>,
}

/// Build the router with all routes and layers. Exposed for tests.
pub fn build_router(ctx: Arc<AppContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/keywords/research", post(handle_research))
        .route("/keywords/metrics", get(handle_metrics))
        .route("/keywords/trends", get(handle_trends))
        .route("/keywords/related", get(handle_related))
        .route("/keywords/tags", get(handle_tags))
        .route("/keywords/bulk-research", post(handle_bulk))
        .route("/keywords/history", get(handle_history).delete(handle_clear_history))
        .route("/keywords/cache", axum::routing::delete(handle_clear_cache))
        .route("/settings/api-keys", get(handle_key_status).post(handle_key_update))
        .route("/settings/api-keys/test", post(handle_key_test))
        .route("/settings/api-keys/disconnect", post(handle_key_disconnect))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { ctx })
}

/// Serve the API on `[server].bind` until the process is terminated.
pub async fn run_server(ctx: Arc<AppContext>) -> anyhow::Result<()> {
    let bind_addr = ctx.config.server.bind.clone();
    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "keyword scout listening");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<ResearchError> for AppError {
    fn from(err: ResearchError) -> Self {
        match err {
            ResearchError::InvalidInput(msg) => bad_request(msg),
            ResearchError::Internal(e) => {
                tracing::error!(error = ?e, "request failed");
                internal("internal error")
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

fn require(keyword: Option<String>) -> Result<String, AppError> {
    keyword.ok_or_else(|| bad_request("keyword query parameter is required"))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ /keywords ============

#[derive(Deserialize)]
struct ResearchBody {
    #[serde(default)]
    keyword: String,
    #[serde(flatten)]
    options: ResearchOptions,
}

async fn handle_research(
    State(state): State<AppState>,
    body: Result<Json<ResearchBody>, JsonRejection>,
) -> Result<Json<KeywordAnalysisResponse>, AppError> {
    let Json(body) = body?;
    let report = state.ctx.research.research(&body.keyword, body.options).await?;
    Ok(Json(report))
}

#[derive(Deserialize)]
struct KeywordQuery {
    keyword: Option<String>,
}

async fn handle_metrics(
    State(state): State<AppState>,
    query: Result<Query<KeywordQuery>, QueryRejection>,
) -> Result<Json<Option<MetricsRecord>>, AppError> {
    let Query(q) = query?;
    Ok(Json(state.ctx.research.metrics(&require(q.keyword)?).await?))
}

async fn handle_trends(
    State(state): State<AppState>,
    query: Result<Query<KeywordQuery>, QueryRejection>,
) -> Result<Json<Option<Vec<TrendPoint>>>, AppError> {
    let Query(q) = query?;
    Ok(Json(state.ctx.research.trends(&require(q.keyword)?).await?))
}

async fn handle_related(
    State(state): State<AppState>,
    query: Result<Query<KeywordQuery>, QueryRejection>,
) -> Result<Json<Option<Vec<RelatedTerm>>>, AppError> {
    let Query(q) = query?;
    Ok(Json(state.ctx.research.related(&require(q.keyword)?).await?))
}

async fn handle_tags(
    State(state): State<AppState>,
    query: Result<Query<KeywordQuery>, QueryRejection>,
) -> Result<Json<Option<Vec<TagSuggestion>>>, AppError> {
    let Query(q) = query?;
    Ok(Json(state.ctx.research.tags(&require(q.keyword)?).await?))
}

async fn handle_bulk(
    State(state): State<AppState>,
    body: Result<Json<BulkRequest>, JsonRejection>,
) -> Result<Json<BulkResponse>, AppError> {
    let Json(request) = body?;
    let max = state.ctx.config.research.bulk_max;
    Ok(Json(state.ctx.research.bulk_research(&request, max).await?))
}

#[derive(Deserialize)]
struct HistoryQuery {
    prefix: Option<String>,
    limit: Option<usize>,
}

async fn handle_history(
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Vec<KeywordRecord>>, AppError> {
    let Query(q) = query?;
    let limit = q.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Ok(Json(state.ctx.research.history(q.prefix.as_deref(), limit).await?))
}

#[derive(Serialize)]
struct ClearResponse {
    removed: u64,
}

async fn handle_clear_history(
    State(state): State<AppState>,
    query: Result<Query<KeywordQuery>, QueryRejection>,
) -> Result<Json<ClearResponse>, AppError> {
    let Query(q) = query?;
    let removed = state.ctx.research.clear_history(q.keyword.as_deref()).await?;
    Ok(Json(ClearResponse { removed }))
}

async fn handle_clear_cache(State(state): State<AppState>) -> Result<Json<ClearResponse>, AppError> {
    let removed = state.ctx.research.clear_cache().await?;
    Ok(Json(ClearResponse { removed }))
}

// ============ /settings/api-keys ============

async fn handle_key_status(State(state): State<AppState>) -> Json<CredentialStatus> {
    Json(state.ctx.credentials.status())
}

async fn handle_key_update(
    State(state): State<AppState>,
    body: Result<Json<CredentialUpdate>, JsonRejection>,
) -> Result<Json<CredentialStatus>, AppError> {
    let Json(update) = body?;
    Ok(Json(state.ctx.credentials.update(update)))
}

async fn handle_key_test(State(state): State<AppState>) -> Json<CredentialCheck> {
    Json(state.ctx.naver.verify_credentials().await)
}

async fn handle_key_disconnect(State(state): State<AppState>) -> Json<CredentialStatus> {
    Json(state.ctx.credentials.clear())
}
