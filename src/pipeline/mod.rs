//! Pipeline stages for bill extraction.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and the inference backend can be swapped without touching the rest.
//!
//! ## Data Flow
//!
//! ```text
//! download ──▶ sniff ──▶ encode ──▶ inference ──▶ normalize
//!  (bytes)     (MIME)    (base64)   (reply text)   (BillData)
//! ```
//!
//! 1. [`download`]: GET the document URL into memory
//! 2. [`sniff`]: classify the bytes as PNG / JPEG / WEBP
//! 3. [`encode`]: base64-wrap the bytes with their MIME type
//! 4. [`inference`]: the only stage that talks to the model
//! 5. [`normalize`]: total coercion of the reply into the response contract

pub mod download;
pub mod encode;
pub mod inference;
pub mod normalize;
pub mod sniff;
