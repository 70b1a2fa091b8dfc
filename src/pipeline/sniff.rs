//! MIME sniffing from magic bytes.
//!
//! Image hosts frequently serve bills as `application/octet-stream` or with
//! the wrong extension, so the `Content-Type` header is ignored and the
//! first four bytes decide.

/// Detect the image MIME type of `bytes`.
///
/// Checked in order: PNG (`89504e47`), JPEG (`ffd8ffe0` / `ffd8ffe1`),
/// WEBP (`52494646`, the RIFF container). Everything else, including
/// buffers shorter than four bytes, is reported as `image/jpeg`.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    let magic = magic_hex(bytes);
    if magic.starts_with("89504e47") {
        "image/png"
    } else if magic.starts_with("ffd8ffe0") || magic.starts_with("ffd8ffe1") {
        "image/jpeg"
    } else if magic.starts_with("52494646") {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

/// Lowercase hex of the first (up to) four bytes.
fn magic_hex(bytes: &[u8]) -> String {
    bytes.iter().take(4).map(|b| format!("{b:02x}")).collect()
}
