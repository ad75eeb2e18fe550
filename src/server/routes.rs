//! Request plumbing shared by the HTTP routes
//!
//! Filename resolution (with path-traversal rejection) and the sizing
//! recommendation endpoint.

use std::path::{Path as FsPath, PathBuf};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::chunk::advisor::{self, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};
use crate::profile::SystemProfile;
use crate::server::AppState;

pub type ApiError = (StatusCode, Json<Value>);

pub fn api_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": { "code": code, "message": message.into() } })))
}

/// Resolve a client-supplied filename inside the uploads directory.
///
/// Rejects anything that could escape the directory: path separators and
/// parent references never reach the filesystem.
pub fn resolve_upload(uploads_dir: &str, filename: &str) -> Result<PathBuf, ApiError> {
    if filename.is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
    {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "INVALID_FILENAME",
            format!("invalid filename: {filename}"),
        ));
    }

    let path = FsPath::new(uploads_dir).join(filename);
    if !path.is_file() {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            "FILE_NOT_FOUND",
            format!("file not found: {filename}"),
        ));
    }
    Ok(path)
}

/// Throughput assumed for the planning-time estimate, tuned low so the
/// figure is an upper bound on typical hardware.
const PLANNING_BYTES_PER_SECOND: u64 = 10 * 1024 * 1024;

/// A chunk exists in a few copies at once while being parsed and scanned.
const CHUNK_MEMORY_FACTOR: u64 = 3;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkConfigResponse {
    pub filename: String,
    pub file_size: u64,
    pub recommended_chunk_size: u64,
    pub recommended_chunk_size_mb: f64,
    pub estimated_chunks: u64,
    /// Rough planning figure, not a measurement.
    pub estimated_processing_time_ms: u64,
    /// Rough peak working-set estimate for one session.
    pub estimated_memory_bytes: u64,
    pub min_chunk_size: u64,
    pub max_chunk_size: u64,
    pub memory_budget: u64,
}

/// GET /api/stream/config/{filename}
pub async fn stream_config(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<ChunkConfigResponse>, ApiError> {
    let path = resolve_upload(&state.config.uploads_dir, &filename)?;
    let file_size = std::fs::metadata(&path)
        .map_err(|e| {
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR", e.to_string())
        })?
        .len();

    let budget = SystemProfile::get().streaming_memory_budget();
    let chunk_size = advisor::recommend(file_size, budget);

    Ok(Json(ChunkConfigResponse {
        filename,
        file_size,
        recommended_chunk_size: chunk_size,
        recommended_chunk_size_mb: chunk_size as f64 / (1024.0 * 1024.0),
        estimated_chunks: advisor::estimate_chunks(file_size, chunk_size),
        estimated_processing_time_ms: file_size * 1000 / PLANNING_BYTES_PER_SECOND,
        estimated_memory_bytes: chunk_size * CHUNK_MEMORY_FACTOR,
        min_chunk_size: MIN_CHUNK_SIZE,
        max_chunk_size: MAX_CHUNK_SIZE,
        memory_budget: budget,
    }))
}
