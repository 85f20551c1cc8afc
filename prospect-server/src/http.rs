//! Prospect HTTP API
//!
//! Each endpoint has a thin axum handler that delegates to an inner function
//! returning `(StatusCode, serde_json::Value)`, so the inner functions can be
//! tested without going through the router.
//!
//! Endpoints:
//! - GET  /messages/get_history : recent exchanges, newest first
//! - POST /messages/send_message: interpret one message
//! - GET  /messages/:id         : one stored exchange
//! - GET  /health               : store status
//! - GET  /version              : server version info

use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use prospect_core::{FailureCause, InterpretationResult, ProspectConfig};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::handler::{ChatHandler, HandlerError};

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub handler: ChatHandler,
    pub config: ProspectConfig,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/messages/get_history", get(history_handler))
        .route("/messages/send_message", post(send_message_handler))
        .route("/messages/:id", get(exchange_handler))
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Serve until the broadcast shutdown signal fires.
pub async fn start_http_server(
    handler: ChatHandler,
    config: ProspectConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let state = Arc::new(HttpState { handler, config });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Prospect HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs and response envelopes
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub message: Option<String>,
}

impl SendMessageRequest {
    /// Read `{"message": "..."}` from a raw body without depending on the
    /// content type. An unreadable body or a non-string `message` yields no
    /// message, which the handler rejects as a validation error.
    pub fn from_body(body: &[u8]) -> Self {
        let message = serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string));
        Self { message }
    }
}

pub fn validation_error_body() -> serde_json::Value {
    serde_json::json!({
        "error": "Message is required",
        "type": "error",
        "content": "Please provide a message.",
    })
}

pub fn service_error_body(details: &str) -> serde_json::Value {
    serde_json::json!({
        "error": "Failed to get response from AI service",
        "type": "error",
        "content": "Sorry, I encountered an error while processing your request. Please try again.",
        "details": details,
    })
}

fn error_body(message: impl std::fmt::Display) -> serde_json::Value {
    serde_json::json!({
        "status": "error",
        "message": message.to_string(),
    })
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

pub async fn history_inner(handler: &ChatHandler, query: HistoryQuery) -> (StatusCode, serde_json::Value) {
    match handler.list_recent(query.limit).await {
        Ok(exchanges) => match serde_json::to_value(exchanges) {
            Ok(body) => (StatusCode::OK, body),
            Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e)),
        },
        Err(e) => {
            tracing::error!(error = %e, "Failed to load history");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body(e))
        }
    }
}

pub async fn send_message_inner(
    handler: &ChatHandler,
    req: SendMessageRequest,
) -> (StatusCode, serde_json::Value) {
    let result = match handler.send_message(req.message.as_deref()).await {
        Ok(result) => result,
        Err(HandlerError::Validation) => return (StatusCode::BAD_REQUEST, validation_error_body()),
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, service_error_body(&e.to_string())),
    };

    result_to_http(result)
}

/// Map an interpretation outcome onto status and body.
pub fn result_to_http(result: InterpretationResult) -> (StatusCode, serde_json::Value) {
    match result.failure_cause() {
        None | Some(FailureCause::Parse) => match serde_json::to_value(&result) {
            Ok(body) => (StatusCode::OK, body),
            Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, service_error_body(&e.to_string())),
        },
        Some(cause) => {
            let details = match &result {
                InterpretationResult::Failure { message, .. } => message.as_str(),
                InterpretationResult::Success { .. } => "",
            };
            let status = StatusCode::from_u16(cause.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, service_error_body(details))
        }
    }
}

pub async fn exchange_inner(handler: &ChatHandler, id: &str) -> (StatusCode, serde_json::Value) {
    let id = match Uuid::parse_str(id) {
        Ok(id) => id,
        Err(_) => return (StatusCode::BAD_REQUEST, error_body(format!("invalid exchange id '{}'", id))),
    };

    match handler.get_exchange(id).await {
        Ok(Some(exchange)) => match serde_json::to_value(exchange) {
            Ok(body) => (StatusCode::OK, body),
            Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e)),
        },
        Ok(None) => (StatusCode::NOT_FOUND, error_body(format!("exchange {} not found", id))),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e)),
    }
}

pub async fn health_inner(handler: &ChatHandler) -> (StatusCode, serde_json::Value) {
    let store = handler.store();
    match store.health().await {
        Ok(detail) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "store": store.name(),
                "store_status": detail,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "store": store.name(),
                "error": e.to_string(),
            }),
        ),
    }
}

/// Pure, no IO.
pub fn version_inner(config: &ProspectConfig) -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "model": config.completion.model,
    })
}

// ============================================================================
// Axum handler wrappers
// ============================================================================

pub async fn history_handler(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let (status, body) = history_inner(&state.handler, query).await;
    (status, Json(body))
}

pub async fn send_message_handler(
    State(state): State<Arc<HttpState>>,
    body: Bytes,
) -> impl IntoResponse {
    let req = SendMessageRequest::from_body(&body);
    let (status, body) = send_message_inner(&state.handler, req).await;
    (status, Json(body))
}

pub async fn exchange_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = exchange_inner(&state.handler, &id).await;
    (status, Json(body))
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.handler).await;
    (status, Json(body))
}

pub async fn version_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner(&state.config)))
}

// ============================================================================
// Unit tests: inner functions called directly
// ============================================================================
