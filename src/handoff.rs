//! The `ocr_text.json` hand-off between extraction and generation.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::batch::BatchSummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrText {
    pub text: String,
}

pub fn write_ocr_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let payload = OcrText {
        text: text.to_string(),
    };
    let json = serde_json::to_string_pretty(&payload)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

pub fn read_ocr_text(path: &Path) -> Result<OcrText> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid hand-off file {}", path.display()))
}

/// Joins every successful entry's marked text, in input order.
///
/// Each file starts with `=== FILE: <name> ===`. Page numbers continue
/// across files (the second file of a 3-page + 2-page batch starts at
/// `--- PAGE 4 ---`).
pub fn combined_marked_text(summary: &BatchSummary) -> String {
    let mut offset = 0;
    let mut sections = Vec::new();
    for document in summary.entries.iter().filter_map(|e| e.document()) {
        sections.push(format!(
            "=== FILE: {} ===\n{}",
            document.filename,
            document.marked_text(offset)
        ));
        offset += document.total_pages;
    }
    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{BatchEntry, EntryOutcome};
    use crate::extract::ExtractedDocument;
    use chrono::Utc;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn ok_entry(name: &str, pages: &[&str]) -> BatchEntry {
        let document =
            ExtractedDocument::from_pages(name, pages.iter().map(|p| p.to_string()).collect());
        BatchEntry {
            source_path: PathBuf::from(name),
            filename: name.to_string(),
            outcome: EntryOutcome::Extracted {
                total_pages: document.total_pages,
                pages_with_text: document.pages_with_text(),
                chars: document.full_text().chars().count(),
                document,
            },
            output_file: None,
        }
    }

    #[test]
    fn roundtrips_through_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("ocr_text.json");
        write_ocr_text(&path, "--- PAGE 1 ---\nRevenue 500").unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"text\""));
        assert_eq!(read_ocr_text(&path).unwrap().text, "--- PAGE 1 ---\nRevenue 500");
    }

    #[test]
    fn missing_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(read_ocr_text(&tmp.path().join("absent.json")).is_err());
    }

    #[test]
    fn page_numbers_continue_across_files() {
        let failed = BatchEntry {
            source_path: PathBuf::from("gone.pdf"),
            filename: "gone.pdf".to_string(),
            outcome: EntryOutcome::Failed {
                error: "File not found: gone.pdf".to_string(),
            },
            output_file: None,
        };
        let summary = BatchSummary {
            entries: vec![
                ok_entry("a.pdf", &["alpha", "", "gamma"]),
                failed,
                ok_entry("b.pdf", &["delta"]),
            ],
            finished_at: Utc::now(),
        };

        let text = combined_marked_text(&summary);
        assert_eq!(
            text,
            "=== FILE: a.pdf ===\n--- PAGE 1 ---\nalpha\n\n--- PAGE 3 ---\ngamma\n\n\
             === FILE: b.pdf ===\n--- PAGE 4 ---\ndelta"
        );
    }
}
