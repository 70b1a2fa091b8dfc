//! Image encoding: raw bytes → base64 payload tagged with its MIME type.
//!
//! Multimodal APIs accept images inline in the JSON request body. The bytes
//! are sent as downloaded; no re-encoding, so the model sees exactly what the
//! caller uploaded.

use super::sniff::sniff_mime;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// An image ready to be inlined into an inference request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    /// `image/png`, `image/jpeg` or `image/webp`.
    pub mime_type: String,
    /// Standard (padded) base64 of the original bytes.
    pub data: String,
}

/// Sniff the MIME type of `bytes` and base64-encode them.
pub fn encode_image(bytes: &[u8]) -> InlineImage {
    let mime_type = sniff_mime(bytes);
    let data = STANDARD.encode(bytes);
    debug!("Encoded {} image → {} bytes base64", mime_type, data.len());

    InlineImage {
        mime_type: mime_type.to_string(),
        data,
    }
}
