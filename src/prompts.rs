//! Prompts sent to the multimodal model.
//!
//! Callers can override the default via
//! [`crate::config::ServerConfig::system_prompt`]; the constant here is used
//! only when no override is provided.

/// Default extraction prompt sent together with the bill image.
///
/// The schema described here is what [`crate::pipeline::normalize`] expects.
/// The normaliser tolerates deviations, but the closer the model follows
/// this text the less it has to default.
pub const EXTRACTION_PROMPT: &str = r#"You are an expert at reading medical and retail bills and invoices.
Extract every line item from the attached bill image and return ONLY a JSON object.

The JSON must match this schema exactly:
{
  "pagewise_line_items": [
    {
      "page_no": "string (1-based page number)",
      "page_type": "Bill Detail" | "Final Bill" | "Pharmacy",
      "bill_items": [
        {
          "item_name": "string, exactly as printed",
          "item_amount": number (net amount for the line),
          "item_rate": number (unit rate),
          "item_quantity": number
        }
      ]
    }
  ],
  "total_item_count": integer (number of bill_items across all pages)
}

Rules:
1. Include every line item exactly once. Do not include sub-totals, taxes,
   discounts or grand totals as items.
2. Use "Pharmacy" for medicine/pharmacy pages, "Final Bill" for summary pages
   with the final payable amount, and "Bill Detail" otherwise.
3. Numbers must be plain JSON numbers without currency symbols or thousands
   separators. Use 0 when a value is not printed.
4. Return ONLY the JSON object: no markdown fences, no commentary."#;
