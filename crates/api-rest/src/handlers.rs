//! Route handlers.
//!
//! Each file handler takes [`AuthenticatedUser`] as its first extractor, so no store call is
//! made for an unauthenticated request.

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::{ApiDoc, AppState};
use api_shared::{FileEntry, HealthRes, HealthService, ListFilesRes, UploadRes};
use attic_files::{FilesError, SavedUpload, StoredFile, UploadCandidate};
use axum::body::Body;
use axum::extract::{Multipart, Path as AxumPath, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use tokio_util::io::ReaderStream;
use utoipa::OpenApi;

/// Multipart field that carries the upload.
pub const UPLOAD_FIELD: &str = "file";

/// Body bytes collected before each blocking write to the temp file.
const WRITE_BATCH_BYTES: usize = 256 * 1024;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint. Does not require authentication.
#[axum::debug_handler]
pub async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    get,
    path = "/files",
    responses(
        (status = 200, description = "Stored files sorted by name", body = ListFilesRes),
        (status = 401, description = "Missing or wrong credentials"),
        (status = 500, description = "Storage unavailable")
    ),
    security(("basic_auth" = []))
)]
/// List every stored file
///
/// Served at both `/` and `/files`.
#[axum::debug_handler]
pub async fn list_files(
    _user: AuthenticatedUser,
    State(state): State<AppState>,
) -> Result<Json<ListFilesRes>, ApiError> {
    let files = state.store.list()?;
    Ok(Json(ListFilesRes {
        files: files.iter().map(file_entry).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = Vec<u8>, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Upload stored", body = UploadRes),
        (status = 400, description = "No file part or unusable file name"),
        (status = 401, description = "Missing or wrong credentials"),
        (status = 413, description = "File or store size cap exceeded"),
        (status = 415, description = "Extension or content type not allowed"),
        (status = 500, description = "Storage unavailable")
    ),
    security(("basic_auth" = []))
)]
/// Upload one file
///
/// The `file` part is streamed to a temp file in the store in batches written on the blocking
/// pool, then validated and renamed into place. Other parts are ignored. If the client goes away half way, the temp file
/// is removed when the candidate is dropped.
#[axum::debug_handler]
pub async fn upload(
    _user: AuthenticatedUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadRes>), ApiError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let declared_name = field.file_name().unwrap_or_default().to_string();
        if declared_name.is_empty() {
            return Err(ApiError::MissingFile);
        }

        let mut candidate = state.store.begin_upload(&declared_name)?;
        let mut pending = Vec::with_capacity(WRITE_BATCH_BYTES);
        while let Some(chunk) = field.chunk().await? {
            pending.extend_from_slice(&chunk);
            if pending.len() >= WRITE_BATCH_BYTES {
                candidate = write_batch(candidate, std::mem::take(&mut pending)).await?;
            }
        }
        if !pending.is_empty() {
            candidate = write_batch(candidate, pending).await?;
        }

        let store = state.store.clone();
        let saved = tokio::task::spawn_blocking(move || store.save(candidate)).await??;

        return Ok((StatusCode::CREATED, Json(upload_res(saved))));
    }

    Err(ApiError::MissingFile)
}

#[utoipa::path(
    get,
    path = "/download/{name}",
    params(("name" = String, Path, description = "Storage name from the listing")),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 400, description = "Unusable file name"),
        (status = 401, description = "Missing or wrong credentials"),
        (status = 403, description = "Name escapes the store"),
        (status = 404, description = "No such file")
    ),
    security(("basic_auth" = []))
)]
/// Download a stored file as an attachment
#[axum::debug_handler]
pub async fn download(
    _user: AuthenticatedUser,
    State(state): State<AppState>,
    AxumPath(name): AxumPath<String>,
) -> Result<Response, ApiError> {
    let opened = state.store.open(&name)?;
    let stored = opened.stored;

    tracing::info!(name = %stored.name, size_bytes = stored.size_bytes, "download");

    let file = tokio::fs::File::from_std(opened.file);
    let body = Body::from_stream(ReaderStream::new(file));

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", stored.name))
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, HeaderValue::from(stored.size_bytes)),
        ],
        body,
    )
        .into_response())
}

#[utoipa::path(
    post,
    path = "/delete/{name}",
    params(("name" = String, Path, description = "Storage name from the listing")),
    responses(
        (status = 204, description = "File removed, or there was nothing to remove"),
        (status = 400, description = "Unusable file name"),
        (status = 401, description = "Missing or wrong credentials"),
        (status = 403, description = "Name escapes the store")
    ),
    security(("basic_auth" = []))
)]
/// Delete a stored file
///
/// Also routed as `DELETE /files/{name}`. Deleting a file that is not there succeeds.
#[axum::debug_handler]
pub async fn delete(
    _user: AuthenticatedUser,
    State(state): State<AppState>,
    AxumPath(name): AxumPath<String>,
) -> Result<StatusCode, ApiError> {
    state.store.delete(&name)?;
    Ok(StatusCode::NO_CONTENT)
}

/// OpenAPI document for this API.
#[axum::debug_handler]
pub async fn openapi_json(
    _user: AuthenticatedUser,
    State(_state): State<AppState>,
) -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Appends `batch` to the candidate's temp file on the blocking pool.
async fn write_batch(
    candidate: UploadCandidate,
    batch: Vec<u8>,
) -> Result<UploadCandidate, ApiError> {
    let candidate = tokio::task::spawn_blocking(move || {
        let mut candidate = candidate;
        candidate.write_chunk(&batch)?;
        Ok::<_, FilesError>(candidate)
    })
    .await??;
    Ok(candidate)
}

fn file_entry(stored: &StoredFile) -> FileEntry {
    FileEntry {
        name: stored.name.to_string(),
        size_bytes: stored.size_bytes,
        modified_at: stored.modified_at.to_rfc3339(),
    }
}

fn upload_res(saved: SavedUpload) -> UploadRes {
    UploadRes {
        name: saved.stored.name.to_string(),
        declared_name: saved.declared_name,
        size_bytes: saved.stored.size_bytes,
        media_type: saved.media_type,
        sha256: saved.sha256,
        modified_at: saved.stored.modified_at.to_rfc3339(),
    }
}
