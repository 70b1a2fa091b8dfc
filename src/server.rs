//! HTTP API: liveness probe and the bill extraction endpoint.
//!
//! ```text
//! GET  /                    → 200 text/plain liveness string
//! POST /extract-bill-data   → 200 BillExtractionResult (in-band success/failure)
//!                             400 missing `document` URL
//!                             500 download / inference failure (detail logged only)
//! ```
//!
//! Every JSON body, including errors, has the [`BillExtractionResult`] shape
//! and is pretty-printed.

use crate::config::ServerConfig;
use crate::error::BillExtractError;
use crate::extract::extract_bill;
use crate::output::BillExtractionResult;
use crate::pipeline::inference::{client_from_config, InferenceClient};
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Body of `GET /`.
pub const LIVENESS_MESSAGE: &str = "Bill extraction API is running";

/// Error reported when the request has no usable `document` field.
pub const MISSING_DOCUMENT_ERROR: &str = "Missing 'document' URL in request body";

/// Error reported for every 500; the real cause only goes to the log.
pub const INTERNAL_SERVER_ERROR: &str = "Internal server error";

/// State shared by all handlers. Everything in it is immutable.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub http: reqwest::Client,
    pub inference: Arc<dyn InferenceClient>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        http: reqwest::Client,
        inference: Arc<dyn InferenceClient>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            http,
            inference,
        }
    }

    /// Build the HTTP client and the inference backend described by `config`.
    pub fn from_config(config: ServerConfig) -> Result<Self, BillExtractError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| BillExtractError::Internal(format!("HTTP client: {e}")))?;
        let inference = client_from_config(&config, http.clone())?;
        Ok(Self::new(config, http, inference))
    }
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/extract-bill-data", post(extract_bill_data))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `config.bind_addr()` and serve until the process is stopped.
pub async fn serve(state: AppState) -> Result<(), BillExtractError> {
    let addr = state.config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| BillExtractError::Internal(format!("Failed to bind {addr}: {e}")))?;
    serve_on(listener, state).await
}

/// Serve on an already-bound listener.
pub async fn serve_on(listener: TcpListener, state: AppState) -> Result<(), BillExtractError> {
    if let Ok(addr) = listener.local_addr() {
        info!(
            "Bill extraction API listening on {} (backend: {})",
            addr,
            state.inference.name()
        );
    }
    axum::serve(listener, build_router(state))
        .await
        .map_err(|e| BillExtractError::Internal(format!("Server error: {e}")))
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn liveness() -> &'static str {
    LIVENESS_MESSAGE
}

/// Handler for `POST /extract-bill-data`.
///
/// The body is read as raw bytes rather than through axum's `Json` extractor
/// so that a malformed body still gets the shaped 400 response. A body axum
/// refuses to buffer (over the default size limit) is treated the same way.
async fn extract_bill_data(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<PrettyJson<BillExtractionResult>, ApiError> {
    let body = body.map_err(|rejection| {
        warn!("Unreadable request body: {}", rejection.body_text());
        ApiError::BadRequest(MISSING_DOCUMENT_ERROR.to_string())
    })?;
    let document = document_url(&body)
        .ok_or_else(|| ApiError::BadRequest(MISSING_DOCUMENT_ERROR.to_string()))?;

    let result = extract_bill(
        &state.http,
        state.inference.as_ref(),
        state.config.prompt(),
        &document,
    )
    .await
    .map_err(ApiError::from)?;

    Ok(PrettyJson(StatusCode::OK, result))
}

/// The non-empty string `document` field of a JSON object body.
fn document_url(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    value
        .get("document")?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    ApiError::Internal(format!("handler panicked: {detail}")).into_response()
}

// ── Responses ────────────────────────────────────────────────────────────────

/// JSON response serialised with `to_string_pretty`.
pub struct PrettyJson<T>(pub StatusCode, pub T);

impl<T: Serialize> IntoResponse for PrettyJson<T> {
    fn into_response(self) -> Response {
        match serde_json::to_string_pretty(&self.1) {
            Ok(body) => (
                self.0,
                [(header::CONTENT_TYPE, "application/json")],
                body,
            )
                .into_response(),
            Err(e) => {
                error!("Failed to serialise response: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_SERVER_ERROR).into_response()
            }
        }
    }
}

/// Request-level failures with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<BillExtractError> for ApiError {
    fn from(err: BillExtractError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(detail) => {
                error!(detail = %detail, "Bill extraction failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    INTERNAL_SERVER_ERROR.to_string(),
                )
            }
        };
        PrettyJson(status, BillExtractionResult::rejected(message)).into_response()
    }
}
