//! Page-level text extraction for PDF documents.
//!
//! Given a PDF path (or its bytes) this module returns the text of every page
//! that yielded something readable, in physical page order, together with the
//! document's total page count. PDF parsing itself is delegated to the
//! `pdf-extract` crate behind the [`PageSource`] trait.
//!
//! Extraction never panics and never writes anything: failures come back as
//! [`ExtractError`] so the batch driver can record them and move on.

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Separator used when joining page texts into a single string.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Width of the visual rules in rendered output.
pub const RULE_WIDTH: usize = 80;

/// Extraction failure for a single document.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("Error extracting PDF: {0}")]
    ExtractionFailure(String),
}

/// Produces the raw text of every page of a PDF, one entry per page.
///
/// Entries may be empty (scanned pages, blank pages); filtering happens in
/// [`ExtractedDocument::from_pages`].
pub trait PageSource: Send + Sync {
    fn pages(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractError>;
}

/// [`PageSource`] backed by `pdf-extract`.
pub struct PdfExtractSource;

impl PageSource for PdfExtractSource {
    fn pages(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
        // pdf-extract panics on some malformed inputs instead of returning Err.
        std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
            .map_err(|_| ExtractError::ExtractionFailure("PDF parser aborted".to_string()))?
            .map_err(|e| ExtractError::ExtractionFailure(e.to_string()))
    }
}

/// Text of one page (1-indexed).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageText {
    pub page_number: u32,
    pub text: String,
}

/// Successfully extracted document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedDocument {
    pub filename: String,
    pub total_pages: usize,
    pub pages: Vec<PageText>,
}

impl ExtractedDocument {
    /// Builds a document from raw per-page output, keeping only pages whose
    /// trimmed text is non-empty. Page numbers follow the input position.
    pub fn from_pages(filename: impl Into<String>, raw_pages: Vec<String>) -> Self {
        let total_pages = raw_pages.len();
        let pages = raw_pages
            .into_iter()
            .enumerate()
            .filter_map(|(idx, raw)| {
                let text = raw.trim();
                if text.is_empty() {
                    None
                } else {
                    Some(PageText {
                        page_number: idx as u32 + 1,
                        text: text.to_string(),
                    })
                }
            })
            .collect();

        Self {
            filename: filename.into(),
            total_pages,
            pages,
        }
    }

    pub fn pages_with_text(&self) -> usize {
        self.pages.len()
    }

    /// All page texts joined with a blank line, in page order.
    pub fn full_text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(PAGE_SEPARATOR)
    }

    /// Text of page `page_number`, or `None` if that page had no text.
    pub fn page_text(&self, page_number: u32) -> Option<&str> {
        self.pages
            .iter()
            .find(|p| p.page_number == page_number)
            .map(|p| p.text.as_str())
    }

    /// Page texts each preceded by a `--- PAGE n ---` marker, with `n`
    /// shifted by `page_offset`. This is the form the memo generator expects.
    pub fn marked_text(&self, page_offset: usize) -> String {
        self.pages
            .iter()
            .map(|p| {
                format!(
                    "--- PAGE {} ---\n{}",
                    p.page_number as usize + page_offset,
                    p.text
                )
            })
            .collect::<Vec<_>>()
            .join(PAGE_SEPARATOR)
    }

    /// Human-readable listing of the document used by `memo extract`.
    pub fn render_display(&self) -> String {
        let heavy = "=".repeat(RULE_WIDTH);
        let light = "─".repeat(RULE_WIDTH);

        let mut out = String::new();
        out.push_str(&format!("{}\n", heavy));
        out.push_str(&format!("DOCUMENT: {}\n", self.filename));
        out.push_str(&format!("TOTAL PAGES: {}\n", self.total_pages));
        out.push_str(&format!("{}\n", heavy));
        for page in &self.pages {
            out.push_str(&format!("\n{}\nPAGE {}\n{}\n\n", light, page.page_number, light));
            out.push_str(&page.text);
            out.push('\n');
        }
        out
    }

    /// Contents of the per-PDF `_extracted.txt` file.
    pub fn render_extracted_file(&self) -> String {
        let light = "─".repeat(RULE_WIDTH);

        let mut out = String::new();
        out.push_str(&format!("Extracted from: {}\n", self.filename));
        out.push_str(&format!("Total Pages: {}\n", self.total_pages));
        out.push_str(&format!("Pages with Text: {}\n", self.pages_with_text()));
        out.push_str(&"=".repeat(RULE_WIDTH));
        out.push_str("\n\n");
        for page in &self.pages {
            out.push_str(&format!("{}\nPAGE {}\n{}\n\n", light, page.page_number, light));
            out.push_str(&page.text);
            out.push_str("\n\n");
        }
        out
    }
}

/// Flat `{success, pages, total_pages, error}` view of an extraction, for
/// JSON output.
#[derive(Debug, Serialize)]
pub struct ExtractionReport {
    pub success: bool,
    pub filename: String,
    pub pages: Vec<PageText>,
    pub total_pages: usize,
    pub pages_with_text: usize,
    pub error: Option<String>,
}

impl ExtractionReport {
    pub fn new(filename: &str, result: &Result<ExtractedDocument, ExtractError>) -> Self {
        match result {
            Ok(doc) => Self {
                success: true,
                filename: doc.filename.clone(),
                pages: doc.pages.clone(),
                total_pages: doc.total_pages,
                pages_with_text: doc.pages_with_text(),
                error: None,
            },
            Err(e) => Self {
                success: false,
                filename: filename.to_string(),
                pages: Vec::new(),
                total_pages: 0,
                pages_with_text: 0,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Base name of `path` as a display string.
pub fn filename_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Extracts a PDF from disk with the default `pdf-extract` backend.
pub fn extract_pdf(path: &Path) -> Result<ExtractedDocument, ExtractError> {
    extract_pdf_with(&PdfExtractSource, path)
}

/// Extracts a PDF from disk with an explicit [`PageSource`].
pub fn extract_pdf_with(
    source: &dyn PageSource,
    path: &Path,
) -> Result<ExtractedDocument, ExtractError> {
    if !path.exists() {
        return Err(ExtractError::FileNotFound(path.to_path_buf()));
    }
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ExtractError::FileNotFound(path.to_path_buf()),
        _ => ExtractError::ExtractionFailure(format!("{}: {}", path.display(), e)),
    })?;
    extract_pdf_bytes_with(source, &filename_of(path), &bytes)
}

/// Extracts a PDF held in memory with the default backend.
pub fn extract_pdf_bytes(filename: &str, bytes: &[u8]) -> Result<ExtractedDocument, ExtractError> {
    extract_pdf_bytes_with(&PdfExtractSource, filename, bytes)
}

pub fn extract_pdf_bytes_with(
    source: &dyn PageSource,
    filename: &str,
    bytes: &[u8],
) -> Result<ExtractedDocument, ExtractError> {
    let raw_pages = source.pages(bytes)?;
    Ok(ExtractedDocument::from_pages(filename, raw_pages))
}

/// Implements `memo extract`: prints one PDF (or one page of it) to stdout.
pub fn run_extract(path: &Path, page: Option<u32>, save: bool, json: bool) -> anyhow::Result<()> {
    let result = extract_pdf(path);
    if json {
        let report = ExtractionReport::new(&filename_of(path), &result);
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    let document = result?;

    if !json {
        match page {
            Some(n) => match document.page_text(n) {
                Some(text) => println!("--- PAGE {} ---\n{}", n, text),
                None => anyhow::bail!(
                    "Page {} has no extractable text ({} pages total)",
                    n,
                    document.total_pages
                ),
            },
            None => print!("{}", document.render_display()),
        }
    }

    if save {
        let out_path = crate::batch::output_path_for(path, None);
        crate::batch::write_extracted_file(&document, &out_path)?;
        println!("Saved extracted text to {}", out_path.display());
    }
    Ok(())
}
