//! HTTP API.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `POST /api/evaluate` | grade one answer |
//! | `GET /api/history/{user}` | list a user's sessions |
//! | `POST /api/history/{user}` | record a session |
//! | `GET /health` | liveness and provider name |
//!
//! Request bodies are read as bytes and decoded here, so that malformed
//! JSON gets the same `400 {error}` shape as a missing field.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use coach_core::SessionSummary;

use crate::history::{HistoryError, HistoryStore, InMemoryHistory};
use crate::orchestrator::{EvaluateInput, EvaluationResponse, Evaluator, MISSING_FIELDS_MESSAGE};

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub evaluator: Arc<Evaluator>,
    pub history: Arc<dyn HistoryStore>,
}

impl AppState {
    pub fn new(evaluator: Evaluator, history: Arc<dyn HistoryStore>) -> Self {
        Self {
            evaluator: Arc::new(evaluator),
            history,
        }
    }

    /// State with an in-memory history store.
    pub fn in_memory(evaluator: Evaluator) -> Self {
        Self::new(evaluator, Arc::new(InMemoryHistory::new()))
    }
}

/// Build the axum Router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/evaluate", post(evaluate_handler))
        .route(
            "/api/history/{user}",
            get(list_history_handler).post(append_history_handler),
        )
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

impl IntoResponse for EvaluationResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

impl IntoResponse for HistoryError {
    fn into_response(self) -> Response {
        let status = match self {
            HistoryError::InvalidUser(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message.into() })),
    )
        .into_response()
}

async fn evaluate_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let input: EvaluateInput = match serde_json::from_slice(&body) {
        Ok(input) => input,
        Err(e) => {
            tracing::debug!(error = %e, "Malformed evaluation body");
            return bad_request(MISSING_FIELDS_MESSAGE);
        }
    };

    state.evaluator.evaluate(input).await.into_response()
}

async fn list_history_handler(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<Vec<SessionSummary>>, HistoryError> {
    Ok(Json(state.history.list(&user).await?))
}

async fn append_history_handler(
    State(state): State<AppState>,
    Path(user): Path<String>,
    body: Bytes,
) -> Response {
    let session: SessionSummary = match serde_json::from_slice(&body) {
        Ok(session) => session,
        Err(e) => return bad_request(format!("Invalid session summary: {}", e)),
    };

    match state.history.append(&user, session).await {
        Ok(history) => Json(history).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let status = if state.evaluator.provider_healthy().await {
        "ok"
    } else {
        "degraded"
    };
    Json(json!({
        "status": status,
        "provider": state.evaluator.provider_name(),
    }))
}

/// Serve the API on `bind` until Ctrl-C.
pub async fn serve(state: AppState, bind: &str) -> Result<(), std::io::Error> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Could not install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
