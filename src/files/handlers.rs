use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    cache::{cache_key, PROJECTS_PATTERN, RESPONSE_TTL_SECS},
    error::ApiError,
    files::{
        dto::ProjectFilesResponse,
        repo::{File, FileWithProject},
        service::{self, UploadItem},
    },
    projects::handlers::cached_response,
    state::AppState,
};

const MAX_FILES: usize = 5;
const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/projects/:id/files", post(upload_files))
        .route("/projects/:id/files", get(get_project_files))
        .route("/files/stats", get(get_user_file_stats))
        .route("/files/:id", get(get_file))
        .route("/files/:id", delete(delete_file))
        // Room for the multipart envelope around MAX_FILES payloads.
        .layer(DefaultBodyLimit::max(MAX_FILES * MAX_FILE_BYTES + 1024 * 1024))
}

/// Drain the multipart stream into upload items, enforcing the count and
/// per-file size limits. A stream error anywhere fails the whole request;
/// nothing buffered so far may be uploaded after a truncated body.
async fn collect_uploads(mut mp: Multipart) -> Result<Vec<UploadItem>, ApiError> {
    let mut uploads: Vec<UploadItem> = Vec::new();
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().map(|s| s.to_string());
        if name.as_deref() != Some("files") && name.as_deref() != Some("files[]") {
            continue;
        }

        let original_name = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unnamed".into());
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        let body = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(format!("invalid multipart body: {e}")))?;

        if body.len() > MAX_FILE_BYTES {
            return Err(ApiError::Validation(format!(
                "{original_name} exceeds the 10MB file limit"
            )));
        }
        uploads.push(UploadItem {
            original_name,
            content_type,
            body,
        });
    }

    if uploads.is_empty() {
        return Err(ApiError::Validation("No files provided".into()));
    }
    if uploads.len() > MAX_FILES {
        return Err(ApiError::Validation(format!(
            "At most {MAX_FILES} files per upload"
        )));
    }
    Ok(uploads)
}

/// POST /projects/:id/files (multipart, field `files`)
#[instrument(skip(state, mp))]
pub async fn upload_files(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(project_id): Path<Uuid>,
    mp: Multipart,
) -> Result<(StatusCode, Json<Vec<File>>), ApiError> {
    let uploads = collect_uploads(mp).await?;

    let saved = service::upload_files(&state, caller.id, project_id, uploads).await?;
    state.cache.invalidate(PROJECTS_PATTERN).await;
    Ok((StatusCode::CREATED, Json(saved)))
}

#[instrument(skip(state))]
pub async fn get_project_files(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let key = cache_key(caller.id, &format!("/projects/{project_id}/files"));
    if let Some(hit) = state.cache.get(&key).await {
        return Ok(cached_response(hit));
    }

    let (files, stats) = service::project_files(&state, caller.id, project_id).await?;
    let response = ProjectFilesResponse { files, stats };
    let body = serde_json::to_string(&response).map_err(anyhow::Error::from)?;
    state.cache.set(&key, &body, RESPONSE_TTL_SECS).await;
    Ok(Json(response).into_response())
}

#[instrument(skip(state))]
pub async fn get_file(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<FileWithProject>, ApiError> {
    let file = service::get_file(&state, caller.id, id).await?;
    Ok(Json(file))
}

#[instrument(skip(state))]
pub async fn delete_file(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    service::delete_file(&state, caller.id, id).await?;
    state.cache.invalidate(PROJECTS_PATTERN).await;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn get_user_file_stats(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<crate::files::repo::FileStats>, ApiError> {
    let stats = service::user_stats(&state, caller.id).await?;
    Ok(Json(stats))
}
