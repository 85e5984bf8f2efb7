//! Memo generation.
//!
//! [`MemoGenerator`] sends the extracted text to a [`CompletionBackend`],
//! strips any markdown fence from the answer, parses it as JSON, normalizes
//! nulls and validates it against the [`Memo`] schema.
//!
//! When the answer is malformed or fails validation the generator can
//! re-prompt the model, appending the rejected answer and a short
//! correction request to the conversation. The number of attempts comes
//! from `[retry]`; the default is a single attempt. Transport failures and
//! timeouts are returned immediately.

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::batch::{run_batch, BatchArgs};
use crate::config::Config;
use crate::handoff::{combined_marked_text, read_ocr_text, write_ocr_text};
use crate::llm::{ChatCompletionClient, ChatMessage, CompletionBackend, CompletionRequest};
use crate::memo::{self, Memo};
use crate::prompt;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Model output is not valid JSON: {reason}")]
    MalformedOutput { reason: String, raw: String },

    #[error("Model output does not match the memo schema: {}", errors.join("; "))]
    SchemaViolation { errors: Vec<String>, raw: String },

    #[error("Completion request timed out after {0}s")]
    RequestTimeout(u64),

    #[error("Completion request failed: {0}")]
    RequestFailure(String),
}

impl GenerateError {
    /// Stable machine-readable code, used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            GenerateError::MalformedOutput { .. } => "malformed_output",
            GenerateError::SchemaViolation { .. } => "schema_violation",
            GenerateError::RequestTimeout(_) => "llm_timeout",
            GenerateError::RequestFailure(_) => "llm_error",
        }
    }

    /// True for errors caused by the model's answer rather than the transport.
    pub fn is_output_error(&self) -> bool {
        matches!(
            self,
            GenerateError::MalformedOutput { .. } | GenerateError::SchemaViolation { .. }
        )
    }

    /// The rejected completion text, if any.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            GenerateError::MalformedOutput { raw, .. }
            | GenerateError::SchemaViolation { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt` (1-based). Doubles per attempt, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt <= 1 || self.backoff.is_zero() {
            return Duration::ZERO;
        }
        let factor = 1u32 << (attempt - 2).min(16);
        self.backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

/// Sampling and retry settings for one generator.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: Option<u32>,
    pub retry: RetryPolicy,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for GenerationSettings {
    fn from(config: &Config) -> Self {
        Self {
            temperature: config.llm.temperature,
            top_p: config.llm.top_p,
            max_tokens: config.llm.max_tokens,
            retry: RetryPolicy {
                max_attempts: config.retry.max_attempts.max(1),
                backoff: config.retry.backoff(),
            },
        }
    }
}

pub struct MemoGenerator {
    backend: Arc<dyn CompletionBackend>,
    settings: GenerationSettings,
}

impl MemoGenerator {
    pub fn new(backend: Arc<dyn CompletionBackend>, settings: GenerationSettings) -> Self {
        Self { backend, settings }
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Generates a validated memo from document text.
    pub async fn generate(&self, document_text: &str) -> Result<Memo, GenerateError> {
        let mut messages = vec![
            ChatMessage::system(prompt::SYSTEM_PROMPT),
            ChatMessage::user(prompt::user_prompt(document_text)),
        ];
        let policy = &self.settings.retry;
        let mut attempt = 1;

        loop {
            let delay = policy.delay_for(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            tracing::info!(
                model = self.backend.model_name(),
                attempt,
                bytes = document_text.len(),
                "requesting memo"
            );
            let request = CompletionRequest {
                messages: messages.clone(),
                temperature: self.settings.temperature,
                top_p: self.settings.top_p,
                max_tokens: self.settings.max_tokens,
            };
            let raw = self.backend.complete(&request).await?;

            match parse_completion(&raw) {
                Ok(memo) => {
                    for gap in memo.attribution_gaps() {
                        tracing::warn!("{}", gap);
                    }
                    tracing::info!(
                        metrics = memo.key_metrics.len(),
                        risks = memo.top_risks.len(),
                        "memo generated"
                    );
                    return Ok(memo);
                }
                Err(err) if attempt < policy.max_attempts => {
                    tracing::warn!(attempt, error = %err, "rejected model output, re-prompting");
                    messages.push(ChatMessage::assistant(raw));
                    messages.push(ChatMessage::user(prompt::repair_prompt(&err)));
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Removes a surrounding markdown code fence (with optional language tag).
///
/// Text without a leading fence is returned trimmed; a missing closing fence
/// is tolerated.
pub fn strip_code_fences(raw: &str) -> &str {
    let text = raw.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let tag_len = rest
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    let body = &rest[tag_len..];
    let body = body.strip_suffix("```").unwrap_or(body);
    body.trim()
}

/// Parses, normalizes and validates one completion.
pub fn parse_completion(raw: &str) -> Result<Memo, GenerateError> {
    let body = strip_code_fences(raw);
    if body.is_empty() {
        return Err(GenerateError::MalformedOutput {
            reason: "empty response".to_string(),
            raw: raw.to_string(),
        });
    }

    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| GenerateError::MalformedOutput {
            reason: e.to_string(),
            raw: raw.to_string(),
        })?;

    memo::validate(memo::normalize(value)).map_err(|errors| GenerateError::SchemaViolation {
        errors,
        raw: raw.to_string(),
    })
}

/// Implements `memo generate`.
///
/// Reads the document text from `--text-file`, or from the hand-off file
/// (`--input`, defaulting to `[handoff].ocr_text_file`).
pub async fn run_generate(
    config: &Config,
    input: Option<PathBuf>,
    text_file: Option<PathBuf>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let text = match text_file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let path = input.unwrap_or_else(|| config.handoff.ocr_text_file.clone());
            read_ocr_text(&path)?.text
        }
    };
    if text.trim().is_empty() {
        anyhow::bail!("Document text is empty; nothing to generate from");
    }

    generate_and_emit(config, &text, output.as_deref()).await
}

/// Implements `memo run`: batch extraction, hand-off file, then generation.
pub async fn run_pipeline(
    config: &Config,
    paths: &[PathBuf],
    progress: crate::progress::ProgressMode,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let args = BatchArgs {
        progress,
        ..BatchArgs::default()
    };
    let summary = run_batch(config, paths, &args)?;
    if summary.succeeded() == 0 {
        anyhow::bail!("No text could be extracted from any input PDF");
    }

    let text = combined_marked_text(&summary);
    let ocr_path = &config.handoff.ocr_text_file;
    write_ocr_text(ocr_path, &text)?;
    println!("Combined text saved to: {}", ocr_path.display());

    generate_and_emit(config, &text, output.as_deref()).await
}

async fn generate_and_emit(
    config: &Config,
    text: &str,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let client = ChatCompletionClient::from_env(&config.llm)?;
    let generator = MemoGenerator::new(Arc::new(client), GenerationSettings::from(config));
    let memo = generator.generate(text).await?;
    let json = serde_json::to_string_pretty(&memo)?;

    match output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            print!("{}", memo.overview());
            println!("Memo saved to: {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
