use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub handoff: HandoffConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Chat-completions endpoint settings.
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}
fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_top_p() -> f32 {
    0.95
}
fn default_timeout_secs() -> u64 {
    60
}

/// Re-prompt policy applied when the model's answer fails parsing or
/// validation. Transport errors are never retried.
#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: 0,
        }
    }
}

fn default_max_attempts() -> u32 {
    1
}

impl RetryConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BatchConfig {
    #[serde(default = "default_true")]
    pub save_individual_files: bool,
    /// Where `_extracted.txt` files go. Defaults to next to each PDF.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default = "default_summary_file")]
    pub summary_file: PathBuf,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            save_individual_files: true,
            output_dir: None,
            summary_file: default_summary_file(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_summary_file() -> PathBuf {
    PathBuf::from("batch_processing_summary.txt")
}

#[derive(Debug, Deserialize, Clone)]
pub struct HandoffConfig {
    #[serde(default = "default_ocr_text_file")]
    pub ocr_text_file: PathBuf,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            ocr_text_file: default_ocr_text_file(),
        }
    }
}

fn default_ocr_text_file() -> PathBuf {
    PathBuf::from("ocr_text.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default)]
    pub keep_uploads: bool,
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            upload_dir: default_upload_dir(),
            keep_uploads: false,
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}
fn default_upload_dir() -> PathBuf {
    PathBuf::from("./uploads")
}
fn default_max_upload_mb() -> usize {
    50
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.llm.model.trim().is_empty() {
            anyhow::bail!("llm.model must not be empty");
        }
        if self.llm.base_url.trim().is_empty() {
            anyhow::bail!("llm.base_url must not be empty");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
        }
        if !(self.llm.top_p > 0.0 && self.llm.top_p <= 1.0) {
            anyhow::bail!("llm.top_p must be in (0.0, 1.0]");
        }
        if self.llm.timeout_secs == 0 {
            anyhow::bail!("llm.timeout_secs must be > 0");
        }
        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be >= 1");
        }
        if self.server.max_upload_mb == 0 {
            anyhow::bail!("server.max_upload_mb must be > 0");
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Loads `path` if it exists, otherwise returns the built-in defaults.
///
/// A file that exists but does not parse or validate is still an error.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.llm.model, "llama-3.3-70b-versatile");
        assert_eq!(cfg.llm.api_key_env, "GROQ_API_KEY");
        assert_eq!(cfg.retry.max_attempts, 1);
        assert!(cfg.batch.save_individual_files);
        assert_eq!(cfg.handoff.ocr_text_file, PathBuf::from("ocr_text.json"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg: Config = toml::from_str(
            r#"
[llm]
model = "llama-3.1-8b-instant"
temperature = 0.3

[retry]
max_attempts = 3
backoff_ms = 250
"#,
        )
        .unwrap();
        assert_eq!(cfg.llm.model, "llama-3.1-8b-instant");
        assert_eq!(cfg.llm.timeout_secs, 60);
        assert_eq!(cfg.retry.backoff(), Duration::from_millis(250));
        assert_eq!(cfg.server.bind, "0.0.0.0:8000");
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("memo.toml");
        std::fs::write(&path, "[llm]\ntemperature = 3.5\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let cfg: Config = toml::from_str("[retry]\nmax_attempts = 0\n").unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let tmp = TempDir::new().unwrap();
        let cfg = load_config_or_default(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.llm.timeout_secs, 60);
    }

    #[test]
    fn broken_file_is_still_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("memo.toml");
        std::fs::write(&path, "[llm\nmodel = ").unwrap();
        assert!(load_config_or_default(&path).is_err());
    }
}
