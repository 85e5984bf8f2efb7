#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// Builds a PDF with one page per entry, each drawing its text in Helvetica.
/// An empty entry produces a page with no text.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let mut operations = Vec::new();
        if !text.is_empty() {
            operations = vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ];
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// A memo answer that passes validation.
pub const VALID_MEMO: &str = r#"{
  "company_info": {"name": "Acme Traders", "address": "12 Market Road", "gstin": "27AAAPL1234C1ZV",
                   "state": "Maharashtra", "state_code": "27", "email": null, "phone": null},
  "buyer_info": {"name": "Beta Retail", "address": null, "gstin": "", "state": "", "state_code": ""},
  "memo_meta": {"credit_note_no": "CN-042", "date": "2024-03-31"},
  "memo_items": [],
  "cgst_rate": 9,
  "sgst_rate": 9,
  "executive_summary": ["Revenue of 18,750,000 in FY2024."],
  "key_metrics": [{"name": "Revenue", "value": "18,750,000", "period": "FY2024",
                   "direction": "increase", "source_pages": [1], "confidence": "strong"}],
  "top_risks": [{"title": "Leverage", "description": "Debt rose", "severity": "medium",
                 "source_pages": [1], "confidence": "strong"}]
}"#;
