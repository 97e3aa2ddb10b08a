//! Thin HTTP surface over the store and the stateless collaborator
//! steps.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/api/status` | Component availability (database, AI) |
//! | `POST` | `/api/scrape` | Scrape a url and store the original |
//! | `POST` | `/api/generate` | Rewrite content in a style/tone |
//! | `POST` | `/api/search` | Ranked search over one partition |
//! | `GET`  | `/api/history/{id}` | Full lineage for an original |
//! | `POST` | `/api/publish` | Finalize content and store the final version |
//!
//! The interactive review loop is not hosted here — decisions need a
//! session, and HTTP front ends drive the store and collaborator steps
//! directly instead.
//!
//! # Error contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "url is required" } }
//! ```
//!
//! Codes: `bad_request` (400), `not_found` (404), `ai_unavailable`
//! (503), `scrape_error` (502), `storage_error` / `internal` (500).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::error::Error;
use crate::models::{Partition, PublicationRequirements};
use crate::search::SearchMode;
use crate::workflow::WorkflowContext;

pub async fn run_server(ctx: Arc<WorkflowContext>) -> anyhow::Result<()> {
    let bind_addr = ctx.config.server.bind.clone();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/api/status", get(handle_status))
        .route("/api/scrape", post(handle_scrape))
        .route("/api/generate", post(handle_generate))
        .route("/api/search", post(handle_search))
        .route("/api/history/{id}", get(handle_history))
        .route("/api/publish", post(handle_publish))
        .layer(cors)
        .with_state(ctx);

    println!("Pressroom server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
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

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn ai_unavailable() -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "ai_unavailable".to_string(),
        message: "no AI provider is configured".to_string(),
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        match &err {
            Error::Scrape { .. } => AppError {
                status: StatusCode::BAD_GATEWAY,
                code: "scrape_error".to_string(),
                message: err.to_string(),
            },
            Error::UnknownPartition(_) | Error::Config(_) => bad_request(err.to_string()),
            Error::Storage(_) => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "storage_error".to_string(),
                message: err.to_string(),
            },
            _ => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal".to_string(),
                message: err.to_string(),
            },
        }
    }
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

// ============ GET /api/status ============

#[derive(Serialize)]
struct StatusResponse {
    database: bool,
    ai: bool,
    status: String,
}

async fn handle_status(State(ctx): State<Arc<WorkflowContext>>) -> Json<StatusResponse> {
    let database = sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(ctx.store.pool())
        .await
        .is_ok();

    Json(StatusResponse {
        database,
        ai: ctx.agents_available(),
        status: "ok".to_string(),
    })
}

// ============ POST /api/scrape ============

#[derive(Deserialize)]
struct ScrapeRequest {
    url: String,
}

#[derive(Serialize)]
struct ScrapeResponse {
    id: String,
    title: String,
    text_content: String,
    snapshot_path: String,
}

async fn handle_scrape(
    State(ctx): State<Arc<WorkflowContext>>,
    Json(req): Json<ScrapeRequest>,
) -> Result<Json<ScrapeResponse>, AppError> {
    if req.url.trim().is_empty() {
        return Err(bad_request("url is required"));
    }

    let page = ctx.scraper.scrape(&req.url).await?;
    let id = ctx.store.store_original(&page).await?;

    Ok(Json(ScrapeResponse {
        id,
        title: page.title,
        text_content: page.text_content,
        snapshot_path: page.snapshot_path,
    }))
}

// ============ POST /api/generate ============

#[derive(Deserialize)]
struct GenerateRequest {
    content: String,
    #[serde(default = "default_style")]
    style: String,
    #[serde(default = "default_tone")]
    tone: String,
}

fn default_style() -> String {
    "modern".to_string()
}

fn default_tone() -> String {
    "engaging".to_string()
}

#[derive(Serialize)]
struct GenerateResponse {
    content: String,
    style: String,
    tone: String,
    used_fallback: bool,
}

async fn handle_generate(
    State(ctx): State<Arc<WorkflowContext>>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    if req.content.trim().is_empty() {
        return Err(bad_request("content is required"));
    }

    let agents = ctx.agents.as_deref().ok_or_else(ai_unavailable)?;

    // Writer degradation: a provider failure returns the input
    // unchanged, flagged so the client can tell.
    let (content, used_fallback) = match agents.rewrite(&req.content, &req.style, &req.tone).await {
        Ok(text) => (text, false),
        Err(e) => {
            warn!("rewrite failed: {e}; returning input unchanged");
            (req.content.clone(), true)
        }
    };

    Ok(Json(GenerateResponse {
        content,
        style: req.style,
        tone: req.tone,
        used_fallback,
    }))
}

// ============ POST /api/search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default = "default_partition")]
    partition: String,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    limit: Option<i64>,
}

fn default_partition() -> String {
    Partition::Final.as_str().to_string()
}

async fn handle_search(
    State(ctx): State<Arc<WorkflowContext>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let partition = Partition::from_str(&req.partition)?;
    let limit = req.limit.unwrap_or(ctx.config.retrieval.final_limit);

    let hits = match &req.mode {
        Some(mode) => {
            let mode = SearchMode::from_str(mode)?;
            ctx.store
                .search_with_mode(partition, &req.query, mode, limit)
                .await?
        }
        None => ctx.store.search(partition, &req.query, limit).await?,
    };

    Ok(Json(serde_json::json!({ "results": hits })))
}

// ============ GET /api/history/{id} ============

async fn handle_history(
    State(ctx): State<Arc<WorkflowContext>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let history = ctx
        .store
        .history(&id)
        .await?
        .ok_or_else(|| not_found(format!("no original with id: {}", id)))?;

    Ok(Json(serde_json::to_value(&history).map_err(Error::from)?))
}

// ============ POST /api/publish ============

#[derive(Deserialize)]
struct PublishRequest {
    original_id: String,
    content: String,
    #[serde(default = "default_style")]
    style: String,
    #[serde(default = "default_tone")]
    tone: String,
}

#[derive(Serialize)]
struct PublishResponse {
    final_id: String,
    status: String,
}

async fn handle_publish(
    State(ctx): State<Arc<WorkflowContext>>,
    Json(req): Json<PublishRequest>,
) -> Result<Json<PublishResponse>, AppError> {
    if req.content.trim().is_empty() {
        return Err(bad_request("content is required"));
    }

    if ctx
        .store
        .get(Partition::Original, &req.original_id)
        .await?
        .is_none()
    {
        return Err(not_found(format!(
            "no original with id: {}",
            req.original_id
        )));
    }

    let requirements = PublicationRequirements::new(&req.style, &req.tone);

    // Finalization degrades to the submitted content.
    let final_content = match ctx.agents.as_deref() {
        Some(agents) => match agents.finalize(&req.content, &requirements).await {
            Ok(text) => text,
            Err(e) => {
                warn!("finalization failed: {e}; publishing the submitted content");
                req.content.clone()
            }
        },
        None => req.content.clone(),
    };

    let final_id = ctx
        .store
        .store_final(&req.original_id, &final_content, &requirements)
        .await?;

    Ok(Json(PublishResponse {
        final_id,
        status: "published".to_string(),
    }))
}
