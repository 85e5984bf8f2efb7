//! Batch progress reporting.
//!
//! Reports per-file progress during `memo batch` and `memo run` so users see
//! which PDF is being processed and how it went. Progress is emitted on
//! **stderr** so stdout stays parseable for scripts.

use std::io::Write;
use std::path::PathBuf;

/// A single progress event emitted by the batch driver.
#[derive(Clone, Debug)]
pub enum BatchProgressEvent {
    /// About to extract file `index` (1-based) of `total`.
    Processing {
        index: usize,
        total: usize,
        filename: String,
    },
    Extracted {
        filename: String,
        pages_with_text: usize,
        total_pages: usize,
    },
    Saved {
        filename: String,
        output_file: PathBuf,
    },
    Failed {
        filename: String,
        error: String,
    },
}

/// Reports batch progress. Implementations write to stderr (human or JSON).
pub trait BatchProgressReporter: Send + Sync {
    fn report(&self, event: BatchProgressEvent);
}

/// Human-friendly progress on stderr: "[2/5] statement.pdf  extracted 4 / 6 pages".
pub struct StderrProgress;

impl BatchProgressReporter for StderrProgress {
    fn report(&self, event: BatchProgressEvent) {
        let line = match &event {
            BatchProgressEvent::Processing {
                index,
                total,
                filename,
            } => format!("[{}/{}] {}  processing...\n", index, total, filename),
            BatchProgressEvent::Extracted {
                filename,
                pages_with_text,
                total_pages,
            } => format!(
                "      {}  extracted {} / {} pages\n",
                filename, pages_with_text, total_pages
            ),
            BatchProgressEvent::Saved {
                filename,
                output_file,
            } => format!("      {}  saved to {}\n", filename, output_file.display()),
            BatchProgressEvent::Failed { filename, error } => {
                format!("      {}  FAILED: {}\n", filename, error)
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl BatchProgressReporter for JsonProgress {
    fn report(&self, event: BatchProgressEvent) {
        let obj = match &event {
            BatchProgressEvent::Processing {
                index,
                total,
                filename,
            } => serde_json::json!({
                "event": "processing",
                "filename": filename,
                "n": index,
                "total": total
            }),
            BatchProgressEvent::Extracted {
                filename,
                pages_with_text,
                total_pages,
            } => serde_json::json!({
                "event": "extracted",
                "filename": filename,
                "pages_with_text": pages_with_text,
                "total_pages": total_pages
            }),
            BatchProgressEvent::Saved {
                filename,
                output_file,
            } => serde_json::json!({
                "event": "saved",
                "filename": filename,
                "output_file": output_file
            }),
            BatchProgressEvent::Failed { filename, error } => serde_json::json!({
                "event": "failed",
                "filename": filename,
                "error": error
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl BatchProgressReporter for NoProgress {
    fn report(&self, _event: BatchProgressEvent) {}
}

/// Formats an integer with thousands separators (`1234567` → `1,234,567`).
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Where batch progress goes, chosen with `--progress`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ProgressMode {
    #[default]
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Parses a `--progress` value: `auto`, `off`, `human` or `json`.
    pub fn parse(value: &str) -> anyhow::Result<Self> {
        match value {
            "auto" => Ok(Self::default_for_tty()),
            "off" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => anyhow::bail!(
                "Unknown progress mode: {}. Use auto, off, human or json.",
                other
            ),
        }
    }

    pub fn reporter(&self) -> Box<dyn BatchProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(18_750_000), "18,750,000");
    }

    #[test]
    fn parse_progress_modes() {
        assert_eq!(ProgressMode::parse("off").unwrap(), ProgressMode::Off);
        assert_eq!(ProgressMode::parse("json").unwrap(), ProgressMode::Json);
        assert!(ProgressMode::parse("loud").is_err());
    }
}
