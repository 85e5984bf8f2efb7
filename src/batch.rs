//! Sequential batch extraction over a list of PDFs.
//!
//! Every input path produces exactly one [`BatchEntry`], in input order. A
//! missing or unreadable file is recorded as a failed entry and processing
//! continues with the next path; nothing aborts the batch early.
//!
//! Successful extractions can optionally be written to
//! `<stem>_extracted.txt`, and the whole run is summarized by
//! [`BatchSummary`] for the console and for `batch_processing_summary.txt`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use globset::{GlobBuilder, GlobMatcher};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::{BatchConfig, Config};
use crate::extract::{
    extract_pdf_with, filename_of, ExtractedDocument, PageSource, PdfExtractSource, RULE_WIDTH,
};
use crate::progress::{format_number, BatchProgressEvent, BatchProgressReporter, ProgressMode};

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub save_individual_files: bool,
    pub output_dir: Option<PathBuf>,
}

impl From<&BatchConfig> for BatchOptions {
    fn from(config: &BatchConfig) -> Self {
        Self {
            save_individual_files: config.save_individual_files,
            output_dir: config.output_dir.clone(),
        }
    }
}

/// Result of processing one input path.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryOutcome {
    Extracted {
        total_pages: usize,
        pages_with_text: usize,
        chars: usize,
        #[serde(skip_serializing)]
        document: ExtractedDocument,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    pub source_path: PathBuf,
    pub filename: String,
    #[serde(flatten)]
    pub outcome: EntryOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,
}

impl BatchEntry {
    pub fn success(&self) -> bool {
        matches!(self.outcome, EntryOutcome::Extracted { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            EntryOutcome::Failed { error } => Some(error),
            EntryOutcome::Extracted { .. } => None,
        }
    }

    pub fn document(&self) -> Option<&ExtractedDocument> {
        match &self.outcome {
            EntryOutcome::Extracted { document, .. } => Some(document),
            EntryOutcome::Failed { .. } => None,
        }
    }

    /// Full extracted text (pages joined by blank lines), if successful.
    pub fn text(&self) -> Option<String> {
        self.document().map(ExtractedDocument::full_text)
    }
}

/// All entries of one batch run, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub entries: Vec<BatchEntry>,
    pub finished_at: DateTime<Utc>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.entries.len()
    }

    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|e| e.success()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    /// Per-entry status lines: `1. OK a.pdf - 3 pages, 1,204 chars`.
    pub fn entry_lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| match &entry.outcome {
                EntryOutcome::Extracted {
                    pages_with_text,
                    chars,
                    ..
                } => format!(
                    "{}. OK {} - {} pages, {} chars",
                    idx + 1,
                    entry.filename,
                    pages_with_text,
                    format_number(*chars as u64)
                ),
                EntryOutcome::Failed { error } => {
                    format!("{}. FAILED {} - {}", idx + 1, entry.filename, error)
                }
            })
            .collect()
    }

    /// Console summary block.
    pub fn render(&self) -> String {
        let heavy = "=".repeat(RULE_WIDTH);
        let light = "─".repeat(RULE_WIDTH);

        let mut out = String::new();
        out.push_str(&format!("{}\nBATCH PROCESSING SUMMARY\n{}\n\n", heavy, heavy));
        out.push_str(&format!("Total PDFs: {}\n", self.total()));
        out.push_str(&format!("Successful: {}\n", self.succeeded()));
        out.push_str(&format!("Failed: {}\n\n", self.failed()));
        out.push_str(&format!("{}\nIndividual Results:\n{}\n", light, light));
        for line in self.entry_lines() {
            out.push_str(&line);
            out.push('\n');
        }
        out
    }

    /// Contents of `batch_processing_summary.txt`.
    pub fn render_report(&self) -> String {
        let mut out = self.render();
        out.push_str(&format!(
            "\nGenerated: {}\n",
            self.finished_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        out
    }

    pub fn write_report(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, self.render_report())
            .with_context(|| format!("Failed to write summary report: {}", path.display()))
    }
}

/// Drives the extractor over a list of paths.
pub struct BatchProcessor {
    options: BatchOptions,
    source: Box<dyn PageSource>,
}

impl BatchProcessor {
    pub fn new(options: BatchOptions) -> Self {
        Self::with_source(options, Box::new(PdfExtractSource))
    }

    pub fn with_source(options: BatchOptions, source: Box<dyn PageSource>) -> Self {
        Self { options, source }
    }

    pub fn process_all(
        &self,
        paths: &[PathBuf],
        reporter: &dyn BatchProgressReporter,
    ) -> BatchSummary {
        let total = paths.len();
        debug!(total, "starting batch");
        let entries = paths
            .iter()
            .enumerate()
            .map(|(idx, path)| self.process_one(idx + 1, total, path, reporter))
            .collect();

        BatchSummary {
            entries,
            finished_at: Utc::now(),
        }
    }

    fn process_one(
        &self,
        index: usize,
        total: usize,
        path: &Path,
        reporter: &dyn BatchProgressReporter,
    ) -> BatchEntry {
        let filename = filename_of(path);
        reporter.report(BatchProgressEvent::Processing {
            index,
            total,
            filename: filename.clone(),
        });

        let document = match extract_pdf_with(self.source.as_ref(), path) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "extraction failed");
                return failed_entry(path, filename, e.to_string(), reporter);
            }
        };

        reporter.report(BatchProgressEvent::Extracted {
            filename: filename.clone(),
            pages_with_text: document.pages_with_text(),
            total_pages: document.total_pages,
        });

        let mut output_file = None;
        if self.options.save_individual_files {
            let out_path = output_path_for(path, self.options.output_dir.as_deref());
            if let Err(e) = write_extracted_file(&document, &out_path) {
                warn!(path = %out_path.display(), error = %e, "could not save extracted text");
                return failed_entry(path, filename, format!("{:#}", e), reporter);
            }
            reporter.report(BatchProgressEvent::Saved {
                filename: filename.clone(),
                output_file: out_path.clone(),
            });
            output_file = Some(out_path);
        }

        BatchEntry {
            source_path: path.to_path_buf(),
            filename,
            outcome: EntryOutcome::Extracted {
                total_pages: document.total_pages,
                pages_with_text: document.pages_with_text(),
                chars: document.full_text().chars().count(),
                document,
            },
            output_file,
        }
    }
}

fn failed_entry(
    path: &Path,
    filename: String,
    error: String,
    reporter: &dyn BatchProgressReporter,
) -> BatchEntry {
    reporter.report(BatchProgressEvent::Failed {
        filename: filename.clone(),
        error: error.clone(),
    });
    BatchEntry {
        source_path: path.to_path_buf(),
        filename,
        outcome: EntryOutcome::Failed { error },
        output_file: None,
    }
}

/// `<dir>/<stem>_extracted.txt`, where `dir` is `output_dir` or the PDF's own
/// directory.
pub fn output_path_for(pdf: &Path, output_dir: Option<&Path>) -> PathBuf {
    let stem = pdf
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    let name = format!("{}_extracted.txt", stem);
    match output_dir {
        Some(dir) => dir.join(name),
        None => pdf.with_file_name(name),
    }
}

pub fn write_extracted_file(document: &ExtractedDocument, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, document.render_extracted_file())
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Expands directory arguments into the PDFs they contain (recursive, sorted).
///
/// Any other argument is kept verbatim, so a missing file still shows up as a
/// failed entry rather than disappearing from the batch.
pub fn expand_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let matcher = pdf_matcher()?;
    let mut expanded = Vec::new();
    for path in paths {
        if !path.is_dir() {
            expanded.push(path.clone());
            continue;
        }
        let mut found = Vec::new();
        for entry in WalkDir::new(path) {
            let entry = entry?;
            if entry.file_type().is_file() && matcher.is_match(entry.path()) {
                found.push(entry.into_path());
            }
        }
        found.sort();
        debug!(dir = %path.display(), count = found.len(), "expanded directory");
        expanded.extend(found);
    }
    Ok(expanded)
}

fn pdf_matcher() -> Result<GlobMatcher> {
    Ok(GlobBuilder::new("**/*.pdf")
        .case_insensitive(true)
        .build()?
        .compile_matcher())
}

/// Command-line overrides for `memo batch`.
#[derive(Debug, Clone, Default)]
pub struct BatchArgs {
    pub no_save: bool,
    pub output_dir: Option<PathBuf>,
    pub summary_file: Option<PathBuf>,
    pub progress: ProgressMode,
    pub json: bool,
}

/// Implements `memo batch`: extracts every input, prints the summary and
/// writes the summary report.
///
/// Per-file failures do not make the command fail.
pub fn run_batch(config: &Config, paths: &[PathBuf], args: &BatchArgs) -> Result<BatchSummary> {
    let inputs = expand_inputs(paths)?;
    if inputs.is_empty() {
        anyhow::bail!("No PDF files to process");
    }

    let mut options = BatchOptions::from(&config.batch);
    if args.no_save {
        options.save_individual_files = false;
    }
    if args.output_dir.is_some() {
        options.output_dir = args.output_dir.clone();
    }

    let reporter = args.progress.reporter();
    let summary = BatchProcessor::new(options).process_all(&inputs, reporter.as_ref());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", summary.render());
    }

    let report_path = args
        .summary_file
        .clone()
        .unwrap_or_else(|| config.batch.summary_file.clone());
    summary.write_report(&report_path)?;
    if !args.json {
        println!("\nSummary saved to: {}", report_path.display());
    }
    Ok(summary)
}
