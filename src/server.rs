//! HTTP server.
//!
//! Exposes the advisor as a small JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/recommend` | Preferences JSON in, ranked recommendations out |
//! | `POST` | `/chat` | One conversational turn (`?message=...` or body) |
//! | `GET`  | `/health` | Health check (version and catalog size) |
//!
//! # Error Contract
//!
//! Every failure, including a malformed request body, is reported as
//! HTTP 500 with a single `detail` field:
//!
//! ```json
//! { "detail": "expected value at line 1 column 1" }
//! ```
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use std::future::Future;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use fretwise_core::models::{Preferences, Recommendation};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::service::Advisor;

/// Build the router over a shared advisor.
pub fn router(advisor: Arc<Advisor>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/recommend", post(handle_recommend))
        .route("/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(advisor)
}

/// Serve on `listener` until `shutdown` resolves, then tear the advisor down.
pub async fn serve<F>(
    listener: TcpListener,
    advisor: Arc<Advisor>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(advisor.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    advisor.shutdown();
    Ok(())
}

/// Build the advisor from `config` and serve on `[server] bind` until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let advisor = Arc::new(Advisor::build(config).await?);
    let listener = TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        products = advisor.catalog().len(),
        "server listening"
    );
    serve(listener, advisor, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
        return;
    }
    tracing::info!("shutdown requested");
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

/// Any handler failure; always rendered as 500 `{"detail": ...}`.
struct AppError(String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(detail = %self.0, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody { detail: self.0 }),
        )
            .into_response()
    }
}

impl<E: std::fmt::Display> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.to_string())
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    products: usize,
}

async fn handle_health(State(advisor): State<Arc<Advisor>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        products: advisor.catalog().len(),
    })
}

// ============ POST /recommend ============

/// The body is taken as raw bytes and parsed here rather than by the
/// `Json` or `String` extractors, so malformed or non-UTF-8 bodies follow
/// the 500 `detail` contract.
async fn handle_recommend(
    State(advisor): State<Arc<Advisor>>,
    body: Bytes,
) -> Result<Json<Vec<Recommendation>>, AppError> {
    let prefs: Preferences = serde_json::from_slice(&body)?;
    let recs = advisor.recommend(&prefs).await?;
    Ok(Json(recs))
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatQuery {
    message: Option<String>,
}

#[derive(Deserialize)]
struct ChatBody {
    message: String,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
}

async fn handle_chat(
    State(advisor): State<Arc<Advisor>>,
    Query(query): Query<ChatQuery>,
    body: Bytes,
) -> Result<Json<ChatResponse>, AppError> {
    let message = chat_message(query.message, &body)?;
    let reply = advisor
        .chat(&message)
        .await
        .map_err(|e| AppError(format!("{:#}", e)))?;
    Ok(Json(ChatResponse {
        response: reply.response,
    }))
}

/// The query parameter wins. Otherwise the body is a `{"message": ...}`
/// object, a JSON string, or plain text.
fn chat_message(query: Option<String>, body: &[u8]) -> Result<String, AppError> {
    if let Some(message) = query {
        return Ok(message);
    }
    let text = std::str::from_utf8(body)?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AppError("message is required".to_string()));
    }
    if let Ok(parsed) = serde_json::from_str::<ChatBody>(trimmed) {
        return Ok(parsed.message);
    }
    if let Ok(serde_json::Value::String(message)) = serde_json::from_str(trimmed) {
        return Ok(message);
    }
    Ok(trimmed.to_string())
}
