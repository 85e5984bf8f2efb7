mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use common::pdf_with_pages;

fn memo_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("memo");
    path
}

/// Runs `memo` inside `dir` with a config path that does not exist, so the
/// built-in defaults apply.
fn run_memo(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = memo_binary();
    let output = Command::new(&binary)
        .current_dir(dir)
        .env_remove("GROQ_API_KEY")
        .arg("--config")
        .arg(dir.join("config").join("memo.toml"))
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run memo binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_batch_valid_and_missing() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("statement.pdf"),
        pdf_with_pages(&["Revenue 18750000", "Net profit 2670000"]),
    )
    .unwrap();

    let (stdout, stderr, success) = run_memo(
        tmp.path(),
        &["batch", "statement.pdf", "missing.pdf", "--progress", "off"],
    );
    assert!(success, "batch failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Total PDFs: 2"), "{}", stdout);
    assert!(stdout.contains("Successful: 1"), "{}", stdout);
    assert!(stdout.contains("Failed: 1"), "{}", stdout);
    assert!(stdout.contains("1. OK statement.pdf"), "{}", stdout);
    assert!(stdout.contains("2. FAILED missing.pdf - File not found: missing.pdf"), "{}", stdout);

    let extracted = fs::read_to_string(tmp.path().join("statement_extracted.txt")).unwrap();
    assert!(extracted.starts_with("Extracted from: statement.pdf\nTotal Pages: 2\n"));

    let report = fs::read_to_string(tmp.path().join("batch_processing_summary.txt")).unwrap();
    assert!(report.contains("Successful: 1"));
    assert!(report.contains("Generated: "));
}

#[test]
fn test_batch_directory_and_no_save() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    fs::create_dir_all(docs.join("q2")).unwrap();
    fs::write(docs.join("a.pdf"), pdf_with_pages(&["alpha"])).unwrap();
    fs::write(docs.join("q2").join("b.PDF"), pdf_with_pages(&["beta"])).unwrap();
    fs::write(docs.join("notes.txt"), "not a pdf").unwrap();

    let (stdout, stderr, success) = run_memo(
        tmp.path(),
        &["batch", "docs", "--no-save", "--progress", "off", "--summary", "out/summary.txt"],
    );
    assert!(success, "batch failed: {}", stderr);
    assert!(stdout.contains("Total PDFs: 2"), "{}", stdout);
    assert!(!docs.join("a_extracted.txt").exists());
    assert!(tmp.path().join("out").join("summary.txt").exists());
}

#[test]
fn test_batch_json_output() {
    let tmp = TempDir::new().unwrap();
    let (stdout, _, success) = run_memo(
        tmp.path(),
        &["batch", "gone.pdf", "--json", "--progress", "off"],
    );
    assert!(success);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let entry = &json["entries"][0];
    assert_eq!(entry["filename"], "gone.pdf");
    assert_eq!(entry["status"], "failed");
    assert_eq!(entry["error"], "File not found: gone.pdf");
}

#[test]
fn test_extract_displays_pages() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("report.pdf"),
        pdf_with_pages(&["First page", "", "Third page"]),
    )
    .unwrap();

    let (stdout, stderr, success) = run_memo(tmp.path(), &["extract", "report.pdf"]);
    assert!(success, "extract failed: {}", stderr);
    assert!(stdout.contains("DOCUMENT: report.pdf"), "{}", stdout);
    assert!(stdout.contains("TOTAL PAGES: 3"), "{}", stdout);
    assert!(stdout.contains("PAGE 1"), "{}", stdout);
    assert!(!tmp.path().join("report_extracted.txt").exists());
}

#[test]
fn test_extract_json_and_save() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("one.pdf"), pdf_with_pages(&["Only page"])).unwrap();

    let (stdout, _, success) = run_memo(tmp.path(), &["extract", "one.pdf", "--json", "--save"]);
    assert!(success);
    let json_end = stdout.rfind('}').unwrap();
    let report: serde_json::Value = serde_json::from_str(&stdout[..=json_end]).unwrap();
    assert_eq!(report["success"], true);
    assert_eq!(report["total_pages"], 1);
    assert!(tmp.path().join("one_extracted.txt").exists());
}

#[test]
fn test_extract_missing_file() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_memo(tmp.path(), &["extract", "nope.pdf"]);
    assert!(!success);
    assert!(stderr.contains("File not found"), "{}", stderr);
}

#[test]
fn test_generate_without_api_key() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("ocr_text.json"),
        r#"{"text": "--- PAGE 1 ---\nRevenue 500"}"#,
    )
    .unwrap();

    let (_, stderr, success) = run_memo(tmp.path(), &["generate"]);
    assert!(!success);
    assert!(stderr.contains("GROQ_API_KEY"), "{}", stderr);
}

#[test]
fn test_generate_empty_text() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("blank.txt"), "   \n").unwrap();

    let (_, stderr, success) = run_memo(tmp.path(), &["generate", "--text-file", "blank.txt"]);
    assert!(!success);
    assert!(stderr.contains("empty"), "{}", stderr);
}

#[test]
fn test_generate_missing_handoff_file() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_memo(tmp.path(), &["generate", "--input", "absent.json"]);
    assert!(!success);
    assert!(stderr.contains("absent.json"), "{}", stderr);
}

#[test]
fn test_invalid_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(
        tmp.path().join("config").join("memo.toml"),
        "[llm]\ntemperature = 5.0\n",
    )
    .unwrap();

    let (_, stderr, success) = run_memo(tmp.path(), &["batch", "x.pdf", "--progress", "off"]);
    assert!(!success);
    assert!(stderr.contains("temperature"), "{}", stderr);
}

#[test]
fn test_unknown_progress_mode() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_memo(tmp.path(), &["batch", "x.pdf", "--progress", "loud"]);
    assert!(!success);
    assert!(stderr.contains("Unknown progress mode"), "{}", stderr);
}
