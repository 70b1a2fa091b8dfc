//! Error types for the bill-extract library.
//!
//! [`BillExtractError`] covers every failure that stops an extraction from
//! producing a result at all: the document could not be fetched, the model
//! endpoint could not be reached, or the service was misconfigured.
//!
//! A reply from the model that is not valid JSON is **not** an error here.
//! The normaliser reports it in-band as a
//! [`crate::output::BillExtractionResult`] with `is_success = false`, because
//! the HTTP exchanges themselves succeeded.

use thiserror::Error;

/// All fatal errors returned by the bill-extract library.
#[derive(Debug, Error)]
pub enum BillExtractError {
    // ── Download errors ───────────────────────────────────────────────────
    /// The document URL answered with a non-2xx status.
    #[error("Failed to download '{url}': {status} {status_text}")]
    DownloadFailed {
        url: String,
        status: u16,
        status_text: String,
    },

    /// The document URL could not be reached or the body could not be read.
    #[error("Failed to download '{url}': {reason}")]
    DownloadTransport { url: String, reason: String },

    // ── Inference errors ──────────────────────────────────────────────────
    /// The inference provider returned an error or could not be reached.
    #[error("Inference call to '{provider}' failed: {message}")]
    InferenceFailed { provider: String, message: String },

    /// The configured provider is not initialised (missing API key etc.).
    #[error("Inference provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
