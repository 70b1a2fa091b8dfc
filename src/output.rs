//! Response types returned by the extraction pipeline and the HTTP API.
//!
//! Every type here serialises to the exact JSON contract callers depend on.
//! Field names are snake_case on the wire; `page_type` is restricted to three
//! literals through [`PageType`].

use crate::pipeline::inference::UsageMetadata;
use serde::Serialize;

/// The complete result of one bill extraction.
///
/// `data` is `None` only for request-level failures produced by the HTTP
/// handler (400 / 500). The pipeline itself always fills it, using
/// [`BillData::default`] when the model reply could not be parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillExtractionResult {
    pub is_success: bool,
    pub token_usage: TokenUsage,
    pub data: Option<BillData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BillExtractionResult {
    /// A successful extraction.
    pub fn success(token_usage: TokenUsage, data: BillData) -> Self {
        Self {
            is_success: true,
            token_usage,
            data: Some(data),
            error: None,
        }
    }

    /// An in-band failure that still carries an (empty) data block.
    pub fn failure(token_usage: TokenUsage, error: impl Into<String>) -> Self {
        Self {
            is_success: false,
            token_usage,
            data: Some(BillData::default()),
            error: Some(error.into()),
        }
    }

    /// A request-level failure: zeroed usage and `data: null`.
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            is_success: false,
            token_usage: TokenUsage::default(),
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Token counts consumed by the inference call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub total_tokens: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl From<Option<&UsageMetadata>> for TokenUsage {
    fn from(usage: Option<&UsageMetadata>) -> Self {
        match usage {
            Some(u) => Self {
                total_tokens: u.total_token_count.unwrap_or(0),
                input_tokens: u.prompt_token_count.unwrap_or(0),
                output_tokens: u.candidates_token_count.unwrap_or(0),
            },
            None => Self::default(),
        }
    }
}

/// Line items grouped by page, plus the overall item count.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BillData {
    pub pagewise_line_items: Vec<PageItems>,
    pub total_item_count: i64,
}

/// The line items found on one page of the bill.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageItems {
    pub page_no: String,
    pub page_type: PageType,
    pub bill_items: Vec<BillItem>,
}

/// Classification of a bill page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum PageType {
    #[default]
    #[serde(rename = "Bill Detail")]
    BillDetail,
    #[serde(rename = "Final Bill")]
    FinalBill,
    #[serde(rename = "Pharmacy")]
    Pharmacy,
}

impl PageType {
    /// Match an exact wire literal. Anything else is `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Bill Detail" => Some(Self::BillDetail),
            "Final Bill" => Some(Self::FinalBill),
            "Pharmacy" => Some(Self::Pharmacy),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BillDetail => "Bill Detail",
            Self::FinalBill => "Final Bill",
            Self::Pharmacy => "Pharmacy",
        }
    }
}

/// One line item.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BillItem {
    pub item_name: String,
    pub item_amount: f64,
    pub item_rate: f64,
    pub item_quantity: f64,
}
