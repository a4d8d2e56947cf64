//! HTTP surface.
//!
//! - `POST /process-file` – multipart upload (field `file`), answered with `{text, images, tables}`.
//!   Rejected files get 400 with `{"detail": "<reason>"}`; extraction failures get 500.
//! - `GET /health` – liveness plus the active OCR engine.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tempfile::TempDir;

use crate::config::ServiceConfig;
use crate::content::ExtractionResult;
use crate::document_parser::{DocumentProcessor, ProcessOutcome, Rejection};

const UPLOAD_FIELD: &str = "file";
const FALLBACK_FILE_NAME: &str = "upload";
const STAGING_PREFIX: &str = "transformo-upload-";

/// Errors surfaced by the HTTP handlers, each mapped to a status code
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Rejected(#[from] Rejection),
    #[error("{0}")]
    UploadTooLarge(String),
    #[error("{0}")]
    InvalidUpload(String),
    #[error(transparent)]
    Extraction(#[from] anyhow::Error),
}

impl ApiError {
    fn from_multipart(error: MultipartError) -> Self {
        if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::UploadTooLarge(error.body_text())
        } else {
            ApiError::InvalidUpload(error.body_text())
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Rejected(_) => StatusCode::BAD_REQUEST,
            ApiError::UploadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::InvalidUpload(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Extraction(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = match &self {
            ApiError::Extraction(e) => {
                log::error!("File processing failed: {:#}", e);
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };
        (self.status(), Json(json!({ "detail": detail }))).into_response()
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    ocr_engine: &'static str,
}

/// Limits and staging location for uploaded files
#[derive(Debug, Clone, PartialEq)]
pub struct UploadSettings {
    pub max_bytes: usize,
    /// Parent of the per-request staging directories; the system temp dir when unset
    pub staging_dir: Option<PathBuf>,
}

impl UploadSettings {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            staging_dir: None,
        }
    }

    pub fn with_staging_dir(mut self, staging_dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(staging_dir.into());
        self
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            max_bytes: config.max_upload_bytes,
            staging_dir: config.upload_dir.clone(),
        }
    }
}

#[derive(Clone)]
struct AppState {
    processor: Arc<DocumentProcessor>,
    staging_dir: Option<Arc<Path>>,
}

/// Build the router serving the extraction API
pub fn create_router(processor: Arc<DocumentProcessor>, uploads: UploadSettings) -> Router {
    let state = AppState {
        processor,
        staging_dir: uploads.staging_dir.map(Arc::from),
    };

    Router::new()
        .route("/process-file", post(process_file))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(uploads.max_bytes))
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl-C
pub async fn start_server(processor: DocumentProcessor, config: &ServiceConfig) -> Result<()> {
    let address = config.bind_address();
    let router = create_router(Arc::new(processor), UploadSettings::from_config(config));

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    log::info!("TransformoDocs listening on http://{}", address);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::warn!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            log::info!("Shutting down");
        })
        .await
        .context("HTTP server failed")?;

    Ok(())
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        ocr_engine: state.processor.ocr_engine_name(),
    })
}

/// Stage the uploaded file and run the dispatcher on it off the async runtime
async fn process_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ExtractionResult>, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::InvalidUpload(e.body_text()))?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(ApiError::from_multipart)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let data = field.bytes().await.map_err(ApiError::from_multipart)?;
        upload = Some((file_name, data));
        break;
    }
    let Some((file_name, data)) = upload else {
        return Err(ApiError::InvalidUpload(format!(
            "Missing multipart field '{}'",
            UPLOAD_FIELD
        )));
    };

    let outcome = tokio::task::spawn_blocking(move || -> Result<ProcessOutcome> {
        let staged = StagedUpload::write(state.staging_dir.as_deref(), file_name.as_deref(), &data)?;
        let outcome = state.processor.process_file(staged.path());
        staged.close();
        outcome
    })
    .await
    .context("Extraction worker failed")??;

    match outcome {
        ProcessOutcome::Extracted(result) => Ok(Json(result)),
        ProcessOutcome::Rejected(rejection) => Err(rejection.into()),
    }
}

/// An upload written to its own temporary directory under its original base name.
/// The directory is removed on `close` or drop.
struct StagedUpload {
    dir: TempDir,
    path: PathBuf,
}

impl StagedUpload {
    fn write(staging_dir: Option<&Path>, file_name: Option<&str>, data: &[u8]) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX);
        let dir = match staging_dir {
            Some(root) => builder
                .tempdir_in(root)
                .with_context(|| format!("Failed to create upload directory in {}", root.display()))?,
            None => builder.tempdir().context("Failed to create upload directory")?,
        };
        let path = dir.path().join(sanitize_file_name(file_name));
        fs::write(&path, data)
            .with_context(|| format!("Failed to stage upload at {}", path.display()))?;

        Ok(Self { dir, path })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn close(self) {
        let dir = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            log::warn!("Failed to remove upload directory {}: {}", dir.display(), e);
        }
    }
}

/// Base name of a client-supplied file name, safe to join onto a directory
fn sanitize_file_name(file_name: Option<&str>) -> String {
    let cleaned: String = file_name
        .unwrap_or_default()
        .replace('\\', "/")
        .chars()
        .filter(|c| *c != '\0')
        .collect();

    match Path::new(&cleaned).file_name() {
        Some(name) => match name.to_string_lossy().trim() {
            "" | "." | ".." => FALLBACK_FILE_NAME.to_string(),
            _ => name.to_string_lossy().into_owned(),
        },
        None => FALLBACK_FILE_NAME.to_string(),
    }
}
