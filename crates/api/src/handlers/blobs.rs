//! Handlers for blob listing, upload, and download.

use axum::extract::{Multipart, Query, State};
use axum::http::{HeaderName, HeaderValue};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{SecondsFormat, Utc};
use dropzone_cloud::transfer::{chunked_download, download_folder};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Response header carrying a one-line transfer summary.
pub const TRANSFER_LOG_HEADER: HeaderName = HeaderName::from_static("x-transfer-log");

// ---------------------------------------------------------------------------
// Query params / payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct FilepathQuery {
    pub filepath: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FolderQuery {
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadedFile {
    pub file: String,
    pub size: u64,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Serialize)]
pub struct ChunkedDownloadResponse {
    pub blob_name: String,
    pub file_path: String,
    pub file_hash: String,
    pub size: u64,
    pub chunks: usize,
}

fn now_millis() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn required(value: Option<String>, name: &str) -> AppResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("Query parameter '{name}' is required")))
}

// ---------------------------------------------------------------------------
// GET /blobs
// ---------------------------------------------------------------------------

/// List every blob with size and modification time.
pub async fn list_blobs(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let entries = state.store.list(None).await?;
    tracing::debug!(count = entries.len(), backend = state.store.backend(), "Listed blobs");
    Ok(Json(DataResponse { data: entries }))
}

// ---------------------------------------------------------------------------
// POST /blobs?filepath=
// ---------------------------------------------------------------------------

/// Upload every file part of a multipart body.
///
/// The blob name is `filepath` when given, otherwise the part's field name.
/// Existing blobs are overwritten.
pub async fn upload_blobs(
    State(state): State<AppState>,
    Query(params): Query<FilepathQuery>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let target = params.filepath.filter(|f| !f.trim().is_empty());
    let mut uploaded = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let blob_name = match (&target, field.name()) {
            (Some(target), _) => target.clone(),
            (None, Some(name)) if !name.is_empty() => name.to_string(),
            _ => {
                return Err(AppError::BadRequest(
                    "Multipart part has no field name and no 'filepath' was given".into(),
                ))
            }
        };

        let start_time = now_millis();
        let data = field.bytes().await?;
        let size = data.len() as u64;
        state.store.put(&blob_name, data.to_vec()).await?;
        let end_time = now_millis();

        tracing::info!(blob = %blob_name, size, "Blob uploaded");
        uploaded.push(UploadedFile {
            file: blob_name,
            size,
            start_time,
            end_time,
        });
    }

    if uploaded.is_empty() {
        return Err(AppError::BadRequest("No files in request body".into()));
    }
    Ok(Json(DataResponse { data: uploaded }))
}

// ---------------------------------------------------------------------------
// GET /blobs/folder?name=
// ---------------------------------------------------------------------------

/// Download every blob under a prefix, contents decoded as UTF-8.
pub async fn download_blob_folder(
    State(state): State<AppState>,
    Query(params): Query<FolderQuery>,
) -> AppResult<impl IntoResponse> {
    let prefix = required(params.name, "name")?;

    let start = now_millis();
    let files = download_folder(state.store.as_ref(), &prefix).await?;
    let end = now_millis();

    let log = format!("Files from folder {prefix} downloaded at {start} to {end}");
    tracing::info!(prefix = %prefix, count = files.len(), "Folder downloaded");

    let header = HeaderValue::from_str(&log)
        .map_err(|e| AppError::InternalError(format!("invalid transfer log header: {e}")))?;
    let count = files.len();
    Ok((
        [(TRANSFER_LOG_HEADER, header)],
        Json(DataResponse {
            data: serde_json::json!({ "files": files, "count": count }),
        }),
    ))
}

// ---------------------------------------------------------------------------
// GET /blobs/chunked?filepath=
// ---------------------------------------------------------------------------

/// Download one blob in ranges to the staging directory and report its hash.
pub async fn chunked_blob_download(
    State(state): State<AppState>,
    Query(params): Query<FilepathQuery>,
) -> AppResult<impl IntoResponse> {
    let blob_name = required(params.filepath, "filepath")?;
    let blob = &state.config.blob;

    let result = chunked_download(
        state.store.as_ref(),
        &blob_name,
        &blob.staging_dir,
        blob.chunk_size,
    )
    .await?;

    Ok(Json(DataResponse {
        data: ChunkedDownloadResponse {
            blob_name,
            file_path: result.path.display().to_string(),
            file_hash: result.sha256,
            size: result.size,
            chunks: result.chunks,
        },
    }))
}
