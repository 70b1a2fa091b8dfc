//! Integration tests for the extraction API.
//!
//! Every outbound dependency runs locally: a small axum app plays the image
//! host and another plays the Gemini `generateContent` endpoint. No test
//! touches the network beyond 127.0.0.1.

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    extract::Path,
    http::{HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bill_extract::pipeline::encode::InlineImage;
use bill_extract::pipeline::inference::{InferenceClient, ModelReply, UsageMetadata};
use bill_extract::{build_router, serve_on, AppState, BillExtractError, ServerConfig};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceExt;

// ── Test helpers ─────────────────────────────────────────────────────────────

const PNG_BYTES: &[u8] = &[0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00];
const WEBP_BYTES: &[u8] = b"RIFF\x10\x00\x00\x00WEBPVP8 ";
const API_KEY: &str = "test-key";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("bill_extract=debug")
        .with_test_writer()
        .try_init();
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Serves a PNG, a WEBP and a 404.
async fn spawn_image_host() -> SocketAddr {
    let app = Router::new()
        .route("/bill.png", get(|| async { PNG_BYTES }))
        .route("/bill.webp", get(|| async { WEBP_BYTES }))
        .route(
            "/missing.png",
            get(|| async { (StatusCode::NOT_FOUND, "no such bill") }),
        );
    spawn(app).await
}

/// Fake `models/{model}:generateContent`. Echoes the inline image MIME type
/// back as the single item's name so tests can see what was sent.
async fn fake_generate(
    Path(action): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some(API_KEY) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"message": "API key not valid"}})),
        )
            .into_response();
    }
    if action != "gemini-test:generateContent" {
        return StatusCode::NOT_FOUND.into_response();
    }

    let mime = body["contents"][0]["parts"][1]["inline_data"]["mime_type"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let extraction = json!({
        "pagewise_line_items": [{
            "page_type": "Pharmacy",
            "bill_items": [
                {"item_name": mime, "item_amount": "99.50", "item_rate": 49.75, "item_quantity": 2},
                {"item_name": "Consultation", "item_amount": 500}
            ]
        }]
    });

    Json(json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": format!("```json\n{extraction}\n```")}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {
            "promptTokenCount": 1290,
            "candidatesTokenCount": 85,
            "totalTokenCount": 1375
        }
    }))
    .into_response()
}

async fn spawn_fake_gemini() -> SocketAddr {
    let app = Router::new().route("/v1beta/models/:action", post(fake_generate));
    spawn(app).await
}

fn gemini_config(gemini: SocketAddr, api_key: &str) -> ServerConfig {
    ServerConfig::builder()
        .api_key(api_key)
        .model("gemini-test")
        .api_base_url(format!("http://{gemini}/v1beta"))
        .build()
        .unwrap()
}

/// Returns the same reply for every call.
struct FixedReply(ModelReply);

#[async_trait]
impl InferenceClient for FixedReply {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn generate(
        &self,
        _prompt: &str,
        _image: &InlineImage,
    ) -> Result<ModelReply, BillExtractError> {
        Ok(self.0.clone())
    }
}

fn stub_app(reply: ModelReply) -> Router {
    build_router(AppState::new(
        ServerConfig::default(),
        reqwest::Client::new(),
        Arc::new(FixedReply(reply)),
    ))
}

fn post_extract(document: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/extract-bill-data")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "document": document }).to_string()))
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let body = to_bytes(response.into_body(), 1 << 20).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

// ── Gemini backend ───────────────────────────────────────────────────────────

#[tokio::test]
async fn png_bill_through_gemini_backend() {
    init_tracing();
    let images = spawn_image_host().await;
    let gemini = spawn_fake_gemini().await;
    let state = AppState::from_config(gemini_config(gemini, API_KEY)).unwrap();

    let response = build_router(state)
        .oneshot(post_extract(&format!("http://{images}/bill.png")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(
        json,
        json!({
            "is_success": true,
            "token_usage": {"total_tokens": 1375, "input_tokens": 1290, "output_tokens": 85},
            "data": {
                "pagewise_line_items": [{
                    "page_no": "1",
                    "page_type": "Pharmacy",
                    "bill_items": [
                        {"item_name": "image/png", "item_amount": 99.5, "item_rate": 49.75, "item_quantity": 2.0},
                        {"item_name": "Consultation", "item_amount": 500.0, "item_rate": 0.0, "item_quantity": 0.0}
                    ]
                }],
                "total_item_count": 2
            }
        })
    );
}

#[tokio::test]
async fn webp_is_sniffed_before_inference() {
    let images = spawn_image_host().await;
    let gemini = spawn_fake_gemini().await;
    let state = AppState::from_config(gemini_config(gemini, API_KEY)).unwrap();

    let response = build_router(state)
        .oneshot(post_extract(&format!("http://{images}/bill.webp")))
        .await
        .unwrap();

    let json = json_body(response).await;
    assert_eq!(
        json["data"]["pagewise_line_items"][0]["bill_items"][0]["item_name"],
        "image/webp"
    );
}

#[tokio::test]
async fn gemini_error_status_is_generic_500() {
    init_tracing();
    let images = spawn_image_host().await;
    let gemini = spawn_fake_gemini().await;
    let state = AppState::from_config(gemini_config(gemini, "wrong-key")).unwrap();

    let response = build_router(state)
        .oneshot(post_extract(&format!("http://{images}/bill.png")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["error"], "Internal server error");
    assert!(json["data"].is_null());
    assert_eq!(json["token_usage"]["total_tokens"], 0);
}

// ── Handler outcomes with a stubbed model ────────────────────────────────────

#[tokio::test]
async fn invalid_model_json_is_reported_in_band() {
    let images = spawn_image_host().await;
    let app = stub_app(ModelReply {
        text: "Sorry, I cannot read this bill.".into(),
        usage: Some(UsageMetadata {
            total_token_count: Some(40),
            prompt_token_count: Some(30),
            candidates_token_count: None,
        }),
    });

    let response = app
        .oneshot(post_extract(&format!("http://{images}/bill.png")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(
        json,
        json!({
            "is_success": false,
            "token_usage": {"total_tokens": 40, "input_tokens": 30, "output_tokens": 0},
            "data": {"pagewise_line_items": [], "total_item_count": 0},
            "error": "Model returned invalid JSON"
        })
    );
}

#[tokio::test]
async fn missing_usage_is_zeroed() {
    let images = spawn_image_host().await;
    let app = stub_app(ModelReply {
        text: r#"{"pagewise_line_items": [{"page_no": 4, "bill_items": [{"item_amount": "12.5"}]}]}"#
            .into(),
        usage: None,
    });

    let response = app
        .oneshot(post_extract(&format!("http://{images}/bill.png")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["is_success"], true);
    assert_eq!(
        json["token_usage"],
        json!({"total_tokens": 0, "input_tokens": 0, "output_tokens": 0})
    );
    let page = &json["data"]["pagewise_line_items"][0];
    assert_eq!(page["page_no"], "4");
    assert_eq!(page["page_type"], "Bill Detail");
    assert_eq!(
        page["bill_items"][0],
        json!({"item_name": "", "item_amount": 12.5, "item_rate": 0.0, "item_quantity": 0.0})
    );
    assert_eq!(json["data"]["total_item_count"], 1);
}

#[tokio::test]
async fn document_404_is_generic_500() {
    init_tracing();
    let images = spawn_image_host().await;
    let app = stub_app(ModelReply::default());

    let response = app
        .oneshot(post_extract(&format!("http://{images}/missing.png")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(
        json,
        json!({
            "is_success": false,
            "token_usage": {"total_tokens": 0, "input_tokens": 0, "output_tokens": 0},
            "data": null,
            "error": "Internal server error"
        })
    );
}

#[tokio::test]
async fn download_error_carries_status() {
    let images = spawn_image_host().await;
    let err = bill_extract::pipeline::download::download_document(
        &reqwest::Client::new(),
        &format!("http://{images}/missing.png"),
    )
    .await
    .unwrap_err();

    match err {
        BillExtractError::DownloadFailed {
            status,
            status_text,
            ..
        } => {
            assert_eq!(status, 404);
            assert_eq!(status_text, "Not Found");
        }
        other => panic!("expected DownloadFailed, got {other:?}"),
    }
}

// ── Real TCP server ──────────────────────────────────────────────────────────

#[tokio::test]
async fn serves_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::new(
        ServerConfig::default(),
        reqwest::Client::new(),
        Arc::new(FixedReply(ModelReply::default())),
    );
    tokio::spawn(async move {
        serve_on(listener, state).await.unwrap();
    });

    let client = reqwest::Client::new();

    let liveness = client
        .get(format!("http://{addr}/"))
        .send()
        .await
        .unwrap();
    assert_eq!(liveness.status(), reqwest::StatusCode::OK);
    assert_eq!(
        liveness.text().await.unwrap(),
        "Bill extraction API is running"
    );

    let rejected = client
        .post(format!("http://{addr}/extract-bill-data"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), reqwest::StatusCode::BAD_REQUEST);
    let text = rejected.text().await.unwrap();
    assert!(text.contains('\n'), "expected pretty JSON, got: {text}");
    let json: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["error"], "Missing 'document' URL in request body");
}
