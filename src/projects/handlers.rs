use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    cache::{cache_key, PROJECTS_PATTERN, RESPONSE_TTL_SECS},
    error::ApiError,
    guard::ensure_owner,
    projects::{
        dto::{CreateProjectRequest, UpdateProjectRequest},
        repo::Project,
    },
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects))
        .route("/projects/:id", get(get_project))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/projects", post(create_project))
        .route("/projects/:id", put(update_project))
        .route("/projects/:id", delete(delete_project))
}

fn validate_title(title: &str) -> Result<(), ApiError> {
    if title.trim().is_empty() {
        return Err(ApiError::Validation("Title is required".into()));
    }
    Ok(())
}

/// Replay a cached response body, flagged so clients can tell.
pub(crate) fn cached_response(body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::HeaderName::from_static("x-cache"), "HIT"),
        ],
        body,
    )
        .into_response()
}

#[instrument(skip(state, payload))]
pub async fn create_project(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(payload): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    validate_title(&payload.title)?;

    let project = Project::create(
        &state.db,
        caller.id,
        payload.title.trim(),
        payload.description.as_deref(),
    )
    .await?;

    state.cache.invalidate(PROJECTS_PATTERN).await;
    tracing::info!(project_id = %project.id, owner_id = %caller.id, "project created");
    Ok((StatusCode::CREATED, Json(project)))
}

#[instrument(skip(state))]
pub async fn list_projects(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Response, ApiError> {
    let key = cache_key(caller.id, "/projects");
    if let Some(hit) = state.cache.get(&key).await {
        return Ok(cached_response(hit));
    }

    let projects = Project::list_by_owner(&state.db, caller.id).await?;
    let body = serde_json::to_string(&projects).map_err(anyhow::Error::from)?;
    state.cache.set(&key, &body, RESPONSE_TTL_SECS).await;
    Ok(Json(projects).into_response())
}

#[instrument(skip(state))]
pub async fn get_project(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let key = cache_key(caller.id, &format!("/projects/{id}"));
    if let Some(hit) = state.cache.get(&key).await {
        return Ok(cached_response(hit));
    }

    let project = Project::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;
    ensure_owner(project.owner_id, caller.id)?;

    let body = serde_json::to_string(&project).map_err(anyhow::Error::from)?;
    state.cache.set(&key, &body, RESPONSE_TTL_SECS).await;
    Ok(Json(project).into_response())
}

#[instrument(skip(state, payload))]
pub async fn update_project(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProjectRequest>,
) -> Result<Json<Project>, ApiError> {
    validate_title(&payload.title)?;

    let project = Project::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;
    ensure_owner(project.owner_id, caller.id)?;

    let updated = Project::update(
        &state.db,
        id,
        payload.title.trim(),
        payload.description.as_deref(),
    )
    .await?;

    state.cache.invalidate(PROJECTS_PATTERN).await;
    Ok(Json(updated))
}

#[instrument(skip(state))]
pub async fn delete_project(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let project = Project::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;
    ensure_owner(project.owner_id, caller.id)?;

    Project::delete(&state.db, id).await?;
    state.cache.invalidate(PROJECTS_PATTERN).await;
    tracing::info!(project_id = %id, "project deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_titles_are_rejected() {
        assert!(validate_title("").is_err());
        assert!(validate_title("   ").is_err());
        assert!(validate_title("Roadmap").is_ok());
    }
}
