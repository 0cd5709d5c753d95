//! REST API for the CampusChain ledger
//!
//! Exposes the read surface (full chain dump, single block, verification)
//! and an append endpoint used by the issue-tracking service.

use axum::{
    extract::{Path, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::blockchain::{Block, BlockRef, ChainFault, Ledger, VerifyReport};
use crate::error::ChainError;
use crate::events::LedgerEvent;

/// Shared handler state.
#[derive(Clone)]
pub struct ApiState {
    pub ledger: Arc<Ledger>,
    pub max_payload_bytes: usize,
    api_stats: Arc<RwLock<ApiStats>>,
}

/// API statistics and monitoring
#[derive(Debug, Default)]
struct ApiStats {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    blocks_appended: u64,
    start_time: Option<Instant>,
}

impl ApiStats {
    fn new() -> Self {
        ApiStats {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    fn record_request(&mut self, success: bool) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }
    }
}

impl ApiState {
    pub fn new(ledger: Arc<Ledger>, max_payload_bytes: usize) -> Self {
        Self {
            ledger,
            max_payload_bytes,
            api_stats: Arc::new(RwLock::new(ApiStats::new())),
        }
    }

    pub async fn get_stats(&self) -> ApiStatsResponse {
        let stats = self.api_stats.read().await;
        let uptime = stats.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0);

        ApiStatsResponse {
            total_requests: stats.total_requests,
            successful_requests: stats.successful_requests,
            failed_requests: stats.failed_requests,
            blocks_appended: stats.blocks_appended,
            uptime_seconds: uptime,
        }
    }
}

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Ledger(ChainError),
    InvalidInput(String),
    NotFound(String),
    PayloadTooLarge(usize),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Ledger(e @ ChainError::CorruptChain { .. }) => (StatusCode::CONFLICT, e.to_string()),
            ApiError::Ledger(e @ ChainError::InvalidPayload(_)) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Ledger(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::PayloadTooLarge(limit) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Payload exceeds {} bytes", limit),
            ),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::Ledger(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Body of `POST /api/chain/blocks`: exactly one of `payload` or `event`.
#[derive(Debug, Deserialize)]
pub struct AppendRequest {
    #[serde(default)]
    pub payload: Option<String>,
    #[serde(default)]
    pub event: Option<LedgerEvent>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub blocks: usize,
}

#[derive(Serialize)]
pub struct AuditResponse {
    pub valid: bool,
    pub faults: Vec<ChainFault>,
}

#[derive(Serialize)]
pub struct ApiStatsResponse {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub blocks_appended: u64,
    pub uptime_seconds: u64,
}

// ============================================================================
// Handlers
// ============================================================================

async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: chrono::Utc::now().to_rfc3339(),
        blocks: state.ledger.len(),
    })
}

async fn get_chain(State(state): State<ApiState>) -> Json<Vec<Block>> {
    Json(state.ledger.get_chain())
}

async fn get_block(
    State(state): State<ApiState>,
    Path(index): Path<u64>,
) -> Result<Json<Block>, ApiError> {
    state
        .ledger
        .block(index)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Block {} not found", index)))
}

async fn verify_chain(State(state): State<ApiState>) -> Json<VerifyReport> {
    Json(state.ledger.verify())
}

async fn audit_chain(State(state): State<ApiState>) -> Json<AuditResponse> {
    let faults = state.ledger.audit();
    Json(AuditResponse {
        valid: faults.is_empty(),
        faults,
    })
}

async fn append_block(
    State(state): State<ApiState>,
    Json(request): Json<AppendRequest>,
) -> Result<Json<BlockRef>, ApiError> {
    let payload = match (request.payload, request.event) {
        (Some(payload), None) => payload,
        (None, Some(event)) => event.to_payload()?,
        _ => {
            return Err(ApiError::InvalidInput(
                "Provide exactly one of 'payload' or 'event'".to_string(),
            ))
        }
    };

    if payload.len() > state.max_payload_bytes {
        return Err(ApiError::PayloadTooLarge(state.max_payload_bytes));
    }

    // Persistence is blocking I/O.
    let ledger = state.ledger.clone();
    let reference = tokio::task::spawn_blocking(move || ledger.append(payload))
        .await
        .map_err(|e| ApiError::InternalError(format!("Append task failed: {}", e)))??;

    state.api_stats.write().await.blocks_appended += 1;
    Ok(Json(reference))
}

async fn get_api_stats(State(state): State<ApiState>) -> Json<ApiStatsResponse> {
    Json(state.get_stats().await)
}

// ============================================================================
// Middleware
// ============================================================================

/// Request statistics middleware
async fn stats_middleware(State(state): State<ApiState>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    let success = response.status().is_success();
    state.api_stats.write().await.record_request(success);

    response
}

/// Logs method, path, status and duration of every request.
async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints (for testing)
pub fn build_api_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![http::Method::GET, http::Method::POST, http::Method::OPTIONS])
        .allow_headers(vec![http::header::CONTENT_TYPE]);

    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/stats", get(get_api_stats))
        .route("/chain", get(get_chain))
        .route("/chain/verify", get(verify_chain))
        .route("/chain/audit", get(audit_chain))
        .route("/chain/block/:index", get(get_block))
        .route("/chain/blocks", axum::routing::post(append_block));

    Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(state.clone(), stats_middleware))
        .layer(middleware::from_fn(logging_middleware))
        .layer(cors)
        .with_state(state)
}

/// Serve the API on `0.0.0.0:port` until the process exits.
pub async fn run_api_server(state: ApiState, port: u16) -> Result<(), ChainError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = build_api_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "api server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
