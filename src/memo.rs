//! Credit memo schema.
//!
//! Record types for the structured memo the model is asked to produce, plus
//! the two steps that turn a parsed JSON value into a [`Memo`]:
//!
//! 1. [`normalize`] coerces `null` to `""` for string fields that default to
//!    empty, and drops `null` sections so their defaults apply. Optional
//!    fields (`email`, `phone`, `batch`, `period`, `direction`) keep `null`.
//! 2. [`validate`] deserializes field by field, collecting every error with
//!    its location, then checks the size bounds.
//!
//! Enumerated values (confidence, severity, direction) are closed enums;
//! anything outside the set is rejected at validation time.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

/// Upper bound on executive summary bullets.
pub const MAX_SUMMARY_BULLETS: usize = 5;
/// Upper bound on reported risks.
pub const MAX_TOP_RISKS: usize = 3;

const COMPANY_STRING_FIELDS: &[&str] = &["name", "address", "gstin", "state", "state_code"];
const BUYER_STRING_FIELDS: &[&str] = &["name", "address", "gstin", "state", "state_code"];
const META_STRING_FIELDS: &[&str] = &[
    "credit_note_no",
    "date",
    "buyers_ref",
    "buyers_order_no",
    "order_date",
    "dispatch_doc_no",
    "dispatch_through",
    "destination",
    "terms",
];

/// Seller details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyInfo {
    pub name: String,
    pub address: String,
    pub gstin: String,
    pub state: String,
    pub state_code: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuyerInfo {
    pub name: String,
    pub address: String,
    pub gstin: String,
    pub state: String,
    pub state_code: String,
}

/// Document references and dispatch details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoMeta {
    pub credit_note_no: String,
    pub date: String,
    pub buyers_ref: String,
    pub buyers_order_no: String,
    pub order_date: String,
    pub dispatch_doc_no: String,
    pub dispatch_through: String,
    pub destination: String,
    pub terms: String,
}

/// One line item. `amount` is expected to equal `quantity * rate` but this is
/// not enforced; the document's own figure wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoItem {
    pub description: String,
    #[serde(default)]
    pub batch: Option<String>,
    #[serde(default)]
    pub hsn: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub quantity: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub rate: f64,
    #[serde(default = "default_unit")]
    pub per: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub amount: f64,
}

fn default_unit() -> String {
    "Nos".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Copied verbatim from the document.
    Strong,
    /// Derived by arithmetic from stated figures.
    Calculated,
    IncompleteData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Increase,
    Decrease,
    Stable,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Strong => "strong",
            Confidence::Calculated => "calculated",
            Confidence::IncompleteData => "incomplete_data",
        }
    }
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A financial figure reported in the memo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub direction: Option<Direction>,
    pub source_pages: BTreeSet<u32>,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub source_pages: BTreeSet<u32>,
    pub confidence: Confidence,
}

/// Complete credit memo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Memo {
    #[serde(default)]
    pub company_info: CompanyInfo,
    #[serde(default)]
    pub buyer_info: BuyerInfo,
    #[serde(default)]
    pub memo_meta: MemoMeta,
    #[serde(default)]
    pub memo_items: Vec<MemoItem>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub cgst_rate: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub sgst_rate: f64,
    #[serde(default)]
    pub executive_summary: Vec<String>,
    #[serde(default)]
    pub key_metrics: Vec<Metric>,
    #[serde(default)]
    pub top_risks: Vec<Risk>,
}

impl Memo {
    /// Violations of the list size bounds.
    pub fn bound_violations(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.executive_summary.len() > MAX_SUMMARY_BULLETS {
            errors.push(format!(
                "executive_summary: at most {} bullets allowed, got {}",
                MAX_SUMMARY_BULLETS,
                self.executive_summary.len()
            ));
        }
        if self.top_risks.len() > MAX_TOP_RISKS {
            errors.push(format!(
                "top_risks: at most {} risks allowed, got {}",
                MAX_TOP_RISKS,
                self.top_risks.len()
            ));
        }
        errors
    }

    /// Strong-confidence metrics and risks that cite no source page.
    ///
    /// These are policy violations, not schema errors: the memo is still
    /// valid, but callers should surface them.
    pub fn attribution_gaps(&self) -> Vec<String> {
        let metrics = self
            .key_metrics
            .iter()
            .filter(|m| m.confidence == Confidence::Strong && m.source_pages.is_empty())
            .map(|m| format!("metric '{}' has no source pages", m.name));
        let risks = self
            .top_risks
            .iter()
            .filter(|r| r.confidence == Confidence::Strong && r.source_pages.is_empty())
            .map(|r| format!("risk '{}' has no source pages", r.title));
        metrics.chain(risks).collect()
    }

    /// Short multi-line overview for logs and the CLI.
    pub fn overview(&self) -> String {
        let or_na = |s: &str| if s.is_empty() { "N/A".to_string() } else { s.to_string() };
        let mut out = String::new();
        out.push_str(&format!("Company: {}\n", or_na(&self.company_info.name)));
        out.push_str(&format!("Buyer: {}\n", or_na(&self.buyer_info.name)));
        out.push_str(&format!(
            "Executive Summary bullets: {}\n",
            self.executive_summary.len()
        ));
        out.push_str(&format!("Key Metrics: {}\n", self.key_metrics.len()));
        out.push_str(&format!("Top Risks: {}\n", self.top_risks.len()));
        for (i, risk) in self.top_risks.iter().enumerate() {
            out.push_str(&format!("  Risk {}: {} ({})\n", i + 1, risk.title, risk.severity));
        }
        out.push_str(&format!("Line Items: {}\n", self.memo_items.len()));
        out
    }
}

fn number_from_value(value: &Value) -> Result<f64, String> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("number out of range: {}", n)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("invalid number: {:?}", s)),
        other => Err(format!("expected a number, found {}", kind_of(other))),
    }
}

/// Accepts JSON numbers and numeric strings (`"12.5"`).
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    number_from_value(&value).map_err(D::Error::custom)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn blank_nulls(section: &mut Map<String, Value>, fields: &[&str]) {
    for field in fields {
        if let Some(value) = section.get_mut(*field) {
            if value.is_null() {
                *value = Value::String(String::new());
            }
        }
    }
}

/// Coerces model output towards the schema without changing its meaning.
///
/// Non-object input is returned unchanged and rejected later by [`validate`].
pub fn normalize(mut data: Value) -> Value {
    if let Some(root) = data.as_object_mut() {
        // null sections, lists and rates fall back to their defaults
        root.retain(|_, v| !v.is_null());

        if let Some(company) = root.get_mut("company_info").and_then(Value::as_object_mut) {
            blank_nulls(company, COMPANY_STRING_FIELDS);
        }
        if let Some(buyer) = root.get_mut("buyer_info").and_then(Value::as_object_mut) {
            blank_nulls(buyer, BUYER_STRING_FIELDS);
        }
        if let Some(meta) = root.get_mut("memo_meta").and_then(Value::as_object_mut) {
            blank_nulls(meta, META_STRING_FIELDS);
        }
        if let Some(items) = root.get_mut("memo_items").and_then(Value::as_array_mut) {
            for item in items.iter_mut().filter_map(Value::as_object_mut) {
                blank_nulls(item, &["hsn"]);
                if item.get("per").is_some_and(Value::is_null) {
                    item.remove("per");
                }
            }
        }
    }
    data
}

fn take_field<T: DeserializeOwned + Default>(
    root: &mut Map<String, Value>,
    key: &str,
    errors: &mut Vec<String>,
) -> T {
    match root.remove(key) {
        None => T::default(),
        Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            errors.push(format!("{}: {}", key, e));
            T::default()
        }),
    }
}

fn take_list<T: DeserializeOwned>(
    root: &mut Map<String, Value>,
    key: &str,
    errors: &mut Vec<String>,
) -> Vec<T> {
    let items = match root.remove(key) {
        None => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(other) => {
            errors.push(format!("{}: expected an array, found {}", key, kind_of(&other)));
            return Vec::new();
        }
    };
    items
        .into_iter()
        .enumerate()
        .filter_map(|(idx, item)| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                errors.push(format!("{}[{}]: {}", key, idx, e));
                None
            }
        })
        .collect()
}

fn take_number(root: &mut Map<String, Value>, key: &str, errors: &mut Vec<String>) -> f64 {
    match root.remove(key) {
        None => 0.0,
        Some(value) => number_from_value(&value).unwrap_or_else(|e| {
            errors.push(format!("{}: {}", key, e));
            0.0
        }),
    }
}

/// Validates a normalized value against the memo schema.
///
/// Returns every error found, each prefixed with its location
/// (`top_risks[1]: unknown variant ...`). Unknown top-level keys are ignored.
pub fn validate(data: Value) -> Result<Memo, Vec<String>> {
    let mut root = match data {
        Value::Object(map) => map,
        other => {
            return Err(vec![format!(
                "expected a JSON object at the top level, found {}",
                kind_of(&other)
            )])
        }
    };

    let mut errors = Vec::new();
    let memo = Memo {
        company_info: take_field(&mut root, "company_info", &mut errors),
        buyer_info: take_field(&mut root, "buyer_info", &mut errors),
        memo_meta: take_field(&mut root, "memo_meta", &mut errors),
        memo_items: take_list(&mut root, "memo_items", &mut errors),
        cgst_rate: take_number(&mut root, "cgst_rate", &mut errors),
        sgst_rate: take_number(&mut root, "sgst_rate", &mut errors),
        executive_summary: take_list(&mut root, "executive_summary", &mut errors),
        key_metrics: take_list(&mut root, "key_metrics", &mut errors),
        top_risks: take_list(&mut root, "top_risks", &mut errors),
    };
    errors.extend(memo.bound_violations());

    if errors.is_empty() {
        Ok(memo)
    } else {
        Err(errors)
    }
}
