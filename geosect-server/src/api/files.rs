//! Spreadsheet import/export handlers
//!
//! POST /files/import, GET /files/import/:id,
//! GET|POST /files/export, GET /files/export/:id, GET /files/export/:id/file

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use geosect_common::{JobKind, JobStatus};

use crate::{
    error::{ApiError, ApiResult},
    services::ArtifactError,
    AppState,
};

/// Multipart field carrying the workbook
pub const UPLOAD_FIELD: &str = "file";

/// Filename offered for every downloaded export
pub const EXPORT_FILENAME: &str = "sections.xlsx";

pub const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// POST /files/import
///
/// Accepts the workbook and answers 202 with the new job before any row is read.
pub async fn start_import(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<JobStatus>)> {
    let mut payload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(UPLOAD_FIELD) {
            payload = Some(field.bytes().await?.to_vec());
            break;
        }
    }

    let payload = payload
        .ok_or_else(|| ApiError::BadRequest(format!("Multipart field '{}' is required", UPLOAD_FIELD)))?;
    if payload.is_empty() {
        return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
    }

    let job = state.jobs.submit_import(payload).await;
    Ok((StatusCode::ACCEPTED, Json(job.status)))
}

/// GET|POST /files/export
pub async fn start_export(State(state): State<AppState>) -> (StatusCode, Json<JobStatus>) {
    let job = state.jobs.submit_export().await;
    (StatusCode::ACCEPTED, Json(job.status))
}

/// Status lookup restricted to one job kind
async fn job_status(state: &AppState, job_id: &str, kind: JobKind) -> ApiResult<Json<JobStatus>> {
    match state.jobs.status(job_id).await {
        Some(status) if status.kind == kind => Ok(Json(status)),
        _ => Err(ApiError::NotFound(format!("{:?} job not found: {}", kind, job_id))),
    }
}

/// GET /files/import/:id
pub async fn get_import_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatus>> {
    job_status(&state, &job_id, JobKind::Import).await
}

/// GET /files/export/:id
pub async fn get_export_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatus>> {
    job_status(&state, &job_id, JobKind::Export).await
}

/// GET /files/export/:id/file
///
/// 404 for an unknown job, 400 until the export is DONE.
pub async fn download_export(State(state): State<AppState>, Path(job_id): Path<String>) -> ApiResult<Response> {
    let path = match state.jobs.export_artifact(&job_id).await {
        Ok(path) => path,
        Err(ArtifactError::UnknownJob) => {
            return Err(ApiError::NotFound(format!("Export job not found: {}", job_id)))
        }
        Err(ArtifactError::NotAnExport) => {
            return Err(ApiError::BadRequest(format!("Job {} is not an export", job_id)))
        }
        Err(ArtifactError::NotReady(status)) => {
            return Err(ApiError::BadRequest(format!(
                "Export {} is not finished (status {})",
                job_id, status
            )))
        }
    };

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound(format!("Export file missing for job {}", job_id)))
        }
        Err(e) => return Err(e.into()),
    };

    let disposition = format!("attachment; filename=\"{}\"", EXPORT_FILENAME);
    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// Build import/export routes; `max_upload_bytes` bounds the import body
pub fn file_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/files/import",
            post(start_import).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/files/import/:id", get(get_import_status))
        .route("/files/export", get(start_export).post(start_export))
        .route("/files/export/:id", get(get_export_status))
        .route("/files/export/:id/file", get(download_export))
}
