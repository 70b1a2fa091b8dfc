//! Document download: fetch the caller-supplied URL into memory.
//!
//! Bills are single images, so the whole body is buffered. There is no
//! retry and no timeout beyond what the shared `reqwest::Client` was built
//! with.

use crate::error::BillExtractError;
use tracing::{debug, info};

/// Fetch `url` with a GET request and return the full response body.
///
/// # Errors
/// - [`BillExtractError::DownloadFailed`] for any non-2xx status, carrying the
///   status code and its canonical reason phrase.
/// - [`BillExtractError::DownloadTransport`] when the request cannot be sent
///   or the body cannot be read.
pub async fn download_document(
    client: &reqwest::Client,
    url: &str,
) -> Result<Vec<u8>, BillExtractError> {
    info!("Downloading document from: {}", url);

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| BillExtractError::DownloadTransport {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(BillExtractError::DownloadFailed {
            url: url.to_string(),
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| BillExtractError::DownloadTransport {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    debug!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}
