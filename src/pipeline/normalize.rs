//! Normalisation: coerce the model's free-form reply into [`BillData`].
//!
//! The model is asked for a fixed JSON shape but nothing guarantees it. It
//! may wrap the object in a ```` ```json ```` fence, quote numbers, invent
//! page types, or drop fields entirely. This module turns any reply text into
//! a [`BillExtractionResult`] without ever failing:
//!
//! 1. strip an outer Markdown code fence
//! 2. parse into a loosely typed [`serde_json::Value`]; a parse failure is
//!    the only way to get `is_success = false` out of here
//! 3. coerce each page and each item field with a total function that falls
//!    back to a documented default
//!
//! A numeric field whose value is `0` and one that is missing or unparsable
//! both come out as `0.0`. Callers cannot tell them apart.

use crate::output::{BillData, BillExtractionResult, BillItem, PageItems, PageType, TokenUsage};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

/// Error string reported when the reply is not valid JSON.
pub const INVALID_JSON_ERROR: &str = "Model returned invalid JSON";

/// Normalise raw reply text into the response contract.
pub fn normalize_extraction(raw: &str, token_usage: TokenUsage) -> BillExtractionResult {
    let cleaned = strip_code_fences(raw);

    let parsed: Value = match serde_json::from_str(&cleaned) {
        Ok(v) => v,
        Err(e) => {
            warn!("Model reply is not valid JSON: {}", e);
            return BillExtractionResult::failure(token_usage, INVALID_JSON_ERROR);
        }
    };

    let data = normalize_data(&parsed);
    debug!(
        "Normalised {} pages, {} items",
        data.pagewise_line_items.len(),
        data.total_item_count
    );
    BillExtractionResult::success(token_usage, data)
}

/// Coerce a parsed reply into [`BillData`].
pub fn normalize_data(parsed: &Value) -> BillData {
    let pages: Vec<PageItems> = parsed
        .get("pagewise_line_items")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .enumerate()
                .map(|(idx, entry)| normalize_page(idx, entry))
                .collect()
        })
        .unwrap_or_default();

    let total_item_count = match parsed.get("total_item_count") {
        Some(Value::Number(n)) => number_to_count(n),
        _ => pages.iter().map(|p| p.bill_items.len() as i64).sum(),
    };

    BillData {
        pagewise_line_items: pages,
        total_item_count,
    }
}

// ── Fence stripping ──────────────────────────────────────────────────────────

static RE_OPENING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```[A-Za-z0-9_+-]*[ \t]*\r?\n?").unwrap());
static RE_CLOSING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```\s*$").unwrap());

/// Remove a Markdown code fence wrapped around the whole reply.
///
/// Only applies when the trimmed text starts with ```` ``` ````; the closing
/// fence is optional (truncated replies often lose it).
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let without_open = RE_OPENING_FENCE.replace(trimmed, "");
    let without_close = RE_CLOSING_FENCE.replace(&without_open, "");
    without_close.trim().to_string()
}

// ── Pages ────────────────────────────────────────────────────────────────────

fn normalize_page(idx: usize, entry: &Value) -> PageItems {
    let page_no = entry
        .get("page_no")
        .and_then(truthy_text)
        .unwrap_or_else(|| (idx + 1).to_string());

    let page_type = entry
        .get("page_type")
        .and_then(Value::as_str)
        .and_then(PageType::from_label)
        .unwrap_or_default();

    let bill_items = entry
        .get("bill_items")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(normalize_item).collect::<Vec<_>>())
        .unwrap_or_default();
    debug!(
        "Page {}: {} ({} items)",
        page_no,
        page_type.as_str(),
        bill_items.len()
    );

    PageItems {
        page_no,
        page_type,
        bill_items,
    }
}

// ── Items ────────────────────────────────────────────────────────────────────

fn normalize_item(item: &Value) -> BillItem {
    BillItem {
        item_name: item.get("item_name").and_then(truthy_text).unwrap_or_default(),
        item_amount: item.get("item_amount").map(coerce_f64).unwrap_or(0.0),
        item_rate: item.get("item_rate").map(coerce_f64).unwrap_or(0.0),
        item_quantity: item.get("item_quantity").map(coerce_f64).unwrap_or(0.0),
    }
}

// ── Scalar coercions ─────────────────────────────────────────────────────────

/// Render a truthy scalar as text: non-empty strings as-is, non-zero numbers
/// in their shortest form, `true` as `"true"`. Falsy values, arrays and
/// objects yield `None` so the caller applies its default.
fn truthy_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => {
            let f = n.as_f64().unwrap_or(0.0);
            if f == 0.0 {
                None
            } else {
                Some(number_text(n))
            }
        }
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

/// Integers print without a fraction; `2.0` prints as `2`.
fn number_text(n: &serde_json::Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Leading decimal literal of a string, as a float parser that stops at the
/// first invalid character would read it.
static RE_LEADING_FLOAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").unwrap());

/// Coerce a JSON value to a finite float, defaulting to `0.0`.
///
/// Numbers are taken as-is. Strings are read up to the first character that
/// cannot continue a decimal literal (`"12.5 INR"` → 12.5). Anything else
/// (null, bool, array, object, unparsable text) is `0.0`.
pub fn coerce_f64(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_leading_float(s),
        _ => None,
    };
    match parsed {
        Some(f) if f.is_finite() => f,
        _ => 0.0,
    }
}

fn parse_leading_float(s: &str) -> Option<f64> {
    RE_LEADING_FLOAT
        .find(s.trim_start())
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// A declared item count, with fractional values truncated toward zero.
fn number_to_count(n: &serde_json::Number) -> i64 {
    if let Some(i) = n.as_i64() {
        i
    } else if let Some(u) = n.as_u64() {
        i64::try_from(u).unwrap_or(i64::MAX)
    } else {
        // `as` saturates for out-of-range floats.
        n.as_f64().map(|f| f.trunc() as i64).unwrap_or(0)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
