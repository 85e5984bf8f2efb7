//! Prompt templates for memo generation.
//!
//! The system prompt fixes the output contract (JSON only, schema shape,
//! literal numbers, page attribution); the user prompt embeds the extracted
//! text. Page attribution relies on `--- PAGE n ---` markers in the text.

use crate::generate::GenerateError;

pub const SYSTEM_PROMPT: &str = r#"You are a senior credit analyst preparing a credit memo from financial documents.

NUMBERS: use only figures that appear literally in the provided text. Never invent, estimate,
round or use placeholder numbers. If a figure is not in the text, leave the metric out.

Return ONE JSON object and nothing else (no markdown, no code fences) with exactly this shape:

{
  "company_info": {"name": string, "address": string, "gstin": string, "state": string,
                   "state_code": string, "email": string | null, "phone": string | null},
  "buyer_info": {"name": string, "address": string, "gstin": string, "state": string,
                 "state_code": string},
  "memo_meta": {"credit_note_no": string, "date": string, "buyers_ref": string,
                "buyers_order_no": string, "order_date": string, "dispatch_doc_no": string,
                "dispatch_through": string, "destination": string, "terms": string},
  "memo_items": [{"description": string, "batch": string | null, "hsn": string,
                  "quantity": number, "rate": number, "per": string, "amount": number}],
  "cgst_rate": number,
  "sgst_rate": number,
  "executive_summary": [string, string, string, string, string],
  "key_metrics": [{"name": string, "value": string, "period": string | null,
                   "direction": "increase" | "decrease" | "stable" | null,
                   "source_pages": number[],
                   "confidence": "strong" | "calculated" | "incomplete_data"}],
  "top_risks": [{"title": string, "description": string,
                 "severity": "low" | "medium" | "high",
                 "source_pages": number[],
                 "confidence": "strong" | "calculated" | "incomplete_data"}]
}

MEMO FIELDS
- company_info is the seller; buyer_info is the buyer; memo_meta holds note numbers, dates,
  references and dispatch details; memo_items are the line items with HSN/SAC code and unit.
- cgst_rate and sgst_rate are percentages; use 0 when the document states none.
- When a string field is not in the document use "" (empty string), never null.
  Only email, phone, batch, period and direction may be null.

EXECUTIVE SUMMARY
- Exactly 5 bullets, one or two sentences each, built from figures in the text:
  growth, profitability, liquidity, leverage and the main concern.

KEY METRICS
- Every major figure the document states: revenue, profit, EBITDA, cash flow, assets,
  liabilities, ratios.
- source_pages lists the page numbers where the figure appears, read from the
  "--- PAGE n ---" markers. Never leave it empty.
- confidence:
  "strong"          the value is written in the document as-is;
  "calculated"      you derived it from stated figures; put the formula in the name
                    (e.g. "ROE (PAT / Equity)") and the inputs in the value
                    (e.g. "20.6% (2,670,000 / 12,975,000)"), and cite the pages of every input;
  "incomplete_data" the inputs are missing or unclear.
- direction compares periods: "increase", "decrease" or "stable".

TOP RISKS
- At most 3, the most material credit risks (leverage, cash flow, margins, concentration).
- Each has a title, a description of its impact, a severity ("high" critical,
  "medium" concerning, "low" minor) and non-empty source_pages.

Copy values exactly as written, including currency symbols and separators:
document "Total Assets: 684,204" gives "value": "684,204", not "684,000" or "700,000"."#;

/// User message embedding the document text.
pub fn user_prompt(document_text: &str) -> String {
    format!(
        r#"Prepare a credit memo for the document below.

Use ONLY numbers that appear in this text, copied exactly. Do not round, estimate or invent.

DOCUMENT TEXT:
{}

CHECKLIST
- seller and buyer details exactly as written
- memo metadata (note number, dates, references, dispatch)
- every line item with exact quantities, rates and amounts
- CGST / SGST rates
- 5 executive summary bullets grounded in the figures above
- key metrics with exact values, source pages from the "--- PAGE n ---" markers, confidence tags
- up to 3 credit risks with severity and source pages

Respond with the JSON object only."#,
        document_text
    )
}

/// Follow-up message sent after a rejected answer.
pub fn repair_prompt(error: &GenerateError) -> String {
    match error {
        GenerateError::SchemaViolation { errors, .. } => format!(
            "Your previous answer did not match the required structure:\n- {}\n\n\
             Return the corrected JSON object only.",
            errors.join("\n- ")
        ),
        _ => "Your previous answer was not a valid JSON object. \
              Return only the JSON object, with no prose and no code fences."
            .to_string(),
    }
}
