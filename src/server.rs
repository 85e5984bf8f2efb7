//! HTTP API for memo generation.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service name, version and endpoint listing |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/generate-memo` | `{ "text": ... }` → memo JSON |
//! | `POST` | `/upload-pdfs` | Multipart PDFs (field `files`) → extraction + memo |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "text must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `malformed_output`, `schema_violation`,
//! `llm_timeout`, `llm_error` and `internal` (all 500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front-ends can
//! upload directly.

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::batch::{BatchEntry, BatchOptions, BatchProcessor};
use crate::config::Config;
use crate::generate::{GenerateError, GenerationSettings, MemoGenerator};
use crate::handoff::{combined_marked_text, write_ocr_text};
use crate::llm::{ChatCompletionClient, CompletionBackend};
use crate::memo::Memo;
use crate::progress::NoProgress;

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    generator: Arc<MemoGenerator>,
}

/// Starts the server with the configured chat-completions client.
///
/// Fails before binding if the API key variable is not set.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let client = ChatCompletionClient::from_env(&config.llm)?;
    run_server_with_backend(config, Arc::new(client)).await
}

/// Starts the server with an explicit completion backend.
pub async fn run_server_with_backend(
    config: &Config,
    backend: Arc<dyn CompletionBackend>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(config, backend);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!(addr = %bind_addr, "memo server listening");
    println!("Credit memo server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Builds the application router. Exposed so tests can serve it on an
/// ephemeral listener.
pub fn router(config: &Config, backend: Arc<dyn CompletionBackend>) -> Router {
    let generator = MemoGenerator::new(backend, GenerationSettings::from(config));
    let state = AppState {
        config: Arc::new(config.clone()),
        generator: Arc::new(generator),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/generate-memo", post(handle_generate_memo))
        .route("/upload-pdfs", post(handle_upload_pdfs))
        .layer(DefaultBodyLimit::max(config.server.max_upload_mb * 1024 * 1024))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<GenerateError> for AppError {
    fn from(err: GenerateError) -> Self {
        tracing::error!(code = err.code(), error = %err, "memo generation failed");
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ GET / and /health ============

#[derive(Serialize)]
struct RootResponse {
    service: &'static str,
    version: &'static str,
    endpoints: Vec<&'static str>,
}

async fn handle_root() -> Json<RootResponse> {
    Json(RootResponse {
        service: "credit-memo",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: vec![
            "GET /health",
            "POST /generate-memo",
            "POST /upload-pdfs",
        ],
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /generate-memo ============

#[derive(Deserialize)]
struct GenerateRequest {
    text: String,
}

async fn handle_generate_memo(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<Memo>, AppError> {
    if request.text.trim().is_empty() {
        return Err(bad_request("text must not be empty"));
    }
    let memo = state.generator.generate(&request.text).await?;
    Ok(Json(memo))
}

// ============ POST /upload-pdfs ============

#[derive(Serialize)]
struct UploadResponse {
    success: bool,
    message: String,
    total_pdfs: usize,
    successful_extractions: usize,
    text_length: usize,
    saved_to: String,
    extraction: Vec<BatchEntry>,
    memo: Memo,
}

async fn handle_upload_pdfs(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let request_dir = state
        .config
        .server
        .upload_dir
        .join(uuid::Uuid::new_v4().to_string());
    let saved = save_uploads(multipart, &request_dir).await;

    let outcome = match saved {
        Ok(paths) if paths.is_empty() => Err(bad_request("no files uploaded")),
        Ok(paths) => extract_uploads(paths).await,
        Err(e) => Err(e),
    };
    if !state.config.server.keep_uploads {
        // best effort; the directory may not exist if nothing was uploaded
        let _ = tokio::fs::remove_dir_all(&request_dir).await;
    }
    let extraction = outcome?;

    let total_pdfs = extraction.total();
    let successful_extractions = extraction.succeeded();
    if successful_extractions == 0 {
        return Err(bad_request("no text could be extracted from the uploaded PDFs"));
    }

    let text = combined_marked_text(&extraction);
    let ocr_path = &state.config.handoff.ocr_text_file;
    write_ocr_text(ocr_path, &text).map_err(|e| internal(format!("{:#}", e)))?;

    let memo = state.generator.generate(&text).await?;

    Ok(Json(UploadResponse {
        success: true,
        message: format!(
            "Extracted text from {} of {} PDFs and generated memo",
            successful_extractions, total_pdfs
        ),
        total_pdfs,
        successful_extractions,
        text_length: text.chars().count(),
        saved_to: ocr_path.display().to_string(),
        extraction: extraction.entries,
        memo,
    }))
}

async fn save_uploads(mut multipart: Multipart, dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let mut paths = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let name = sanitize_filename(field.file_name().unwrap_or("upload.pdf"));
        let data = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read upload: {}", e)))?;

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| internal(format!("failed to create upload dir: {}", e)))?;
        let mut path = dir.join(&name);
        if paths.contains(&path) {
            path = dir.join(format!("{}_{}", paths.len() + 1, name));
        }
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| internal(format!("failed to save upload: {}", e)))?;
        tracing::debug!(path = %path.display(), bytes = data.len(), "saved upload");
        paths.push(path);
    }
    Ok(paths)
}

async fn extract_uploads(paths: Vec<PathBuf>) -> Result<crate::batch::BatchSummary, AppError> {
    tokio::task::spawn_blocking(move || {
        let processor = BatchProcessor::new(BatchOptions {
            save_individual_files: false,
            output_dir: None,
        });
        processor.process_all(&paths, &NoProgress)
    })
    .await
    .map_err(|e| internal(format!("extraction task failed: {}", e)))
}

/// Keeps only the final path component, replacing anything outside
/// `[A-Za-z0-9._-]` with `_`.
fn sanitize_filename(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "upload.pdf".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_directories_and_odd_chars() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("Q3 report (final).pdf"), "Q3_report__final_.pdf");
        assert_eq!(sanitize_filename(".."), "upload.pdf");
        assert_eq!(sanitize_filename(""), "upload.pdf");
    }

    #[test]
    fn generation_errors_map_to_500_with_code() {
        let err = AppError::from(GenerateError::RequestTimeout(60));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "llm_timeout");
    }
}
