//! HTTP API endpoints for the Viva orchestrator.
//!
//! This module provides the REST surface a presentation layer drives the
//! examination through, plus the WebSocket endpoint for observing session
//! events in real time.
//!
//! # Endpoints
//!
//! - `POST /api/exam/start` - Start a session for a document
//! - `POST /api/exam/response` - Submit the student's response
//! - `POST /api/exam/retry` - Discard the session and restart with the same questions
//! - `POST /api/exam/new` - Discard the session entirely
//! - `GET /api/exam` - Get the current session snapshot
//! - `GET /ws` - WebSocket event stream

use std::sync::Arc;

use axum::{
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::error::VivaError;
use crate::events::{run_socket, SessionEvent};
use crate::orchestrator::ExamOrchestrator;
use crate::session::Session;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for the start endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    /// Name/handle of the document to be examined.
    pub document_ref: String,
}

/// Request body for the response endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRequest {
    /// The student's free-text response.
    pub text: String,
}

/// Response body for the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// The current session snapshot, absent while idle.
    pub session: Option<Session>,
}

/// Response body for the new-session endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSessionResponse {
    /// Whether a session was discarded.
    pub discarded: bool,
}

/// Error response body returned on failure.
///
/// The `kind` field lets the presentation layer distinguish "please
/// resubmit" (`invalid_input`) from "grading degraded"
/// (`evaluation_unavailable`) from "cannot start"
/// (`document_unprocessable`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
    /// Machine-readable error kind.
    pub kind: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The orchestrator driving the examination.
    pub orchestrator: ExamOrchestrator,
}

impl AppState {
    /// Creates a new `AppState` around an orchestrator.
    #[must_use]
    pub const fn new(orchestrator: ExamOrchestrator) -> Self {
        Self { orchestrator }
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type mapping orchestrator errors onto HTTP responses.
#[derive(Debug)]
struct ApiError(VivaError);

impl From<VivaError> for ApiError {
    fn from(error: VivaError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            VivaError::InvalidInput { .. } | VivaError::DocumentUnprocessable { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            VivaError::StaleResult { .. } => StatusCode::CONFLICT,
            VivaError::EvaluationUnavailable { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse {
            error: self.0.to_string(),
            kind: self.0.kind().to_string(),
        });
        (status, body).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints.
///
/// # Returns
///
/// An axum `Router` configured with:
/// - All API routes under `/api`
/// - The WebSocket event stream at `/ws`
/// - CORS middleware for development
/// - Tracing middleware for request logging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS for development (allow all origins)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the API routes
    let api_routes = Router::new()
        .route("/exam/start", post(handle_start))
        .route("/exam/response", post(handle_response))
        .route("/exam/retry", post(handle_retry))
        .route("/exam/new", post(handle_new_session))
        .route("/exam", get(handle_status));

    // Combine with state and middleware
    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `POST /api/exam/start`.
async fn handle_start(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartRequest>,
) -> Result<Json<Session>, ApiError> {
    info!(document = %request.document_ref, "Start request received");
    let session = state.orchestrator.start(&request.document_ref).await?;
    Ok(Json(session))
}

/// Handler for `POST /api/exam/response`.
async fn handle_response(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResponseRequest>,
) -> Result<Json<Session>, ApiError> {
    info!(length = request.text.len(), "Response received");
    let session = state.orchestrator.submit_response(&request.text).await?;
    Ok(Json(session))
}

/// Handler for `POST /api/exam/retry`.
async fn handle_retry(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Session>, ApiError> {
    info!("Retry request received");
    let session = state.orchestrator.retry().await?;
    Ok(Json(session))
}

/// Handler for `POST /api/exam/new`.
async fn handle_new_session(State(state): State<Arc<AppState>>) -> Json<NewSessionResponse> {
    info!("New-session request received");
    let discarded = state.orchestrator.new_session().await;
    Json(NewSessionResponse { discarded })
}

/// Handler for `GET /api/exam`.
async fn handle_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let session = state.orchestrator.snapshot().await;
    Json(StatusResponse { session })
}

/// WebSocket upgrade handler for `GET /ws`.
///
/// Sends a `connected` event with the current snapshot, then forwards all
/// broadcast session events to the client.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    info!("New WebSocket connection request");
    let snapshot = state.orchestrator.snapshot().await;
    let initial = SessionEvent::connected(snapshot);
    let broadcaster = state.orchestrator.broadcaster().clone();
    ws.on_upgrade(move |socket| run_socket(socket, initial, broadcaster))
}

// ============================================================================
// Tests
// ============================================================================
