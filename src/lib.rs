//! # bill-extract
//!
//! Extract structured line items from bill and invoice images using a
//! multimodal LLM, served over a small HTTP API.
//!
//! ## Pipeline Overview
//!
//! ```text
//! POST /extract-bill-data {"document": "<url>"}
//!  │
//!  ├─ 1. Download   fetch the image bytes (non-2xx → 500)
//!  ├─ 2. Sniff      magic bytes → image/png | image/jpeg | image/webp
//!  ├─ 3. Encode     bytes → base64 inline image
//!  ├─ 4. Inference  prompt + image → reply text + token usage
//!  ├─ 5. Normalise  fence strip, JSON parse, per-field coercion
//!  └─ 6. Respond    pretty-printed BillExtractionResult
//! ```
//!
//! The model's reply is untrusted. [`pipeline::normalize`] guarantees the
//! response shape regardless of what comes back: unknown page types collapse
//! to `"Bill Detail"`, unparsable numbers become `0.0`, missing page numbers
//! become the page's position. Only a reply that is not JSON at all is
//! reported as `is_success: false`, and even then with HTTP 200.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bill_extract::{extract_bill, pipeline::inference::client_from_config, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::builder().api_key("AIza...").build()?;
//!     let http = reqwest::Client::new();
//!     let inference = client_from_config(&config, http.clone())?;
//!     let result = extract_bill(
//!         &http,
//!         inference.as_ref(),
//!         config.prompt(),
//!         "https://example.org/bill.png",
//!     )
//!     .await?;
//!     println!("{}", serde_json::to_string_pretty(&result)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `bill-extract` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ServerConfig, ServerConfigBuilder};
pub use error::BillExtractError;
pub use extract::extract_bill;
pub use output::{BillData, BillExtractionResult, BillItem, PageItems, PageType, TokenUsage};
pub use server::{build_router, serve, serve_on, AppState};
