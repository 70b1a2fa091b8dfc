//! Single-document extraction entry point.
//!
//! Runs one bill through every pipeline stage in order and returns the
//! normalised result. Used by the HTTP handler and by the `--extract` CLI
//! mode so both report identical results for the same document.

use crate::output::{BillExtractionResult, TokenUsage};
use crate::pipeline::{download, encode, inference::InferenceClient, normalize};
use std::time::Instant;
use tracing::{debug, info};

/// Extract line items from the bill image at `document_url`.
///
/// # Returns
/// `Ok(BillExtractionResult)` whenever the model answered, even if its reply
/// could not be parsed (check `result.is_success`).
///
/// # Errors
/// Returns `Err(BillExtractError)` when the document cannot be downloaded or
/// the inference call fails.
pub async fn extract_bill(
    http: &reqwest::Client,
    inference: &dyn InferenceClient,
    prompt: &str,
    document_url: &str,
) -> Result<BillExtractionResult, crate::BillExtractError> {
    let start = Instant::now();
    info!("Starting extraction: {}", document_url);

    // ── Step 1: Download ─────────────────────────────────────────────────
    let bytes = download::download_document(http, document_url).await?;

    // ── Step 2: Sniff + encode ───────────────────────────────────────────
    let image = encode::encode_image(&bytes);
    debug!("Document is {} ({} bytes)", image.mime_type, bytes.len());

    // ── Step 3: Inference ────────────────────────────────────────────────
    let reply = inference.generate(prompt, &image).await?;
    let token_usage = TokenUsage::from(reply.usage.as_ref());

    // ── Step 4: Normalise ────────────────────────────────────────────────
    let result = normalize::normalize_extraction(&reply.text, token_usage);

    info!(
        "Extraction complete via {}: success={}, items={}, tokens={}, {}ms",
        inference.name(),
        result.is_success,
        result
            .data
            .as_ref()
            .map(|d| d.total_item_count)
            .unwrap_or(0),
        result.token_usage.total_tokens,
        start.elapsed().as_millis()
    );

    Ok(result)
}
