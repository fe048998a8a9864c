use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::ApiError,
    files::repo::{CreateFileData, File, FileStats, FileWithProject},
    guard::ensure_owner,
    projects::repo::Project,
    state::AppState,
};

#[derive(Debug)]
pub struct UploadItem {
    pub original_name: String,
    pub content_type: String,
    pub body: Bytes,
}

/// Object key for an attachment: unique per upload, grouped by project.
fn object_key(project_id: Uuid, stored_name: &str) -> String {
    format!("taskify/projects/{project_id}/{stored_name}")
}

/// Collapse an original filename into something safe for an object key,
/// keeping the extension.
fn stored_name(original: &str) -> String {
    let sanitized: String = original
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
            c
        } else {
            '_'
        })
        .collect();
    format!("{}-{}", Uuid::new_v4(), sanitized)
}

async fn owned_project(
    state: &AppState,
    caller_id: Uuid,
    project_id: Uuid,
) -> Result<Project, ApiError> {
    let project = Project::find_by_id(&state.db, project_id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;
    ensure_owner(project.owner_id, caller_id)?;
    Ok(project)
}

pub async fn upload_files(
    state: &AppState,
    caller_id: Uuid,
    project_id: Uuid,
    uploads: Vec<UploadItem>,
) -> Result<Vec<File>, ApiError> {
    owned_project(state, caller_id, project_id).await?;

    let mut saved = Vec::with_capacity(uploads.len());
    for item in uploads {
        let stored = stored_name(&item.original_name);
        let key = object_key(project_id, &stored);
        let size = item.body.len() as i64;

        state
            .storage
            .put_object(&key, item.body, &item.content_type)
            .await?;

        let file = File::create(
            &state.db,
            CreateFileData {
                original_name: &item.original_name,
                stored_name: &stored,
                mime_type: &item.content_type,
                size,
                url: &state.storage.object_url(&key),
                public_id: &key,
                project_id,
                uploaded_by: caller_id,
            },
        )
        .await?;

        info!(file_id = %file.id, %project_id, name = %file.original_name, "file uploaded");
        saved.push(file);
    }
    Ok(saved)
}

pub async fn project_files(
    state: &AppState,
    caller_id: Uuid,
    project_id: Uuid,
) -> Result<(Vec<File>, FileStats), ApiError> {
    owned_project(state, caller_id, project_id).await?;
    let files = File::list_by_project(&state.db, project_id).await?;
    let stats = File::project_stats(&state.db, project_id).await?;
    Ok((files, stats))
}

pub async fn get_file(
    state: &AppState,
    caller_id: Uuid,
    file_id: Uuid,
) -> Result<FileWithProject, ApiError> {
    let file = File::find_by_id(&state.db, file_id)
        .await?
        .ok_or(ApiError::NotFound("File"))?;
    // Ownership is the project owner's, not the uploader's.
    ensure_owner(file.project_owner_id, caller_id)?;
    Ok(file)
}

pub async fn delete_file(
    state: &AppState,
    caller_id: Uuid,
    file_id: Uuid,
) -> Result<(), ApiError> {
    let file = get_file(state, caller_id, file_id).await?;

    // Object-store deletion is best effort; the metadata row goes regardless.
    if let Err(e) = state.storage.delete_object(&file.file.public_id).await {
        warn!(error = %e, public_id = %file.file.public_id, "object store delete failed");
    }

    File::delete(&state.db, file_id).await?;
    info!(%file_id, "file deleted");
    Ok(())
}

pub async fn user_stats(state: &AppState, caller_id: Uuid) -> Result<FileStats, ApiError> {
    Ok(File::user_stats(&state.db, caller_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_names_are_unique_and_keep_extension() {
        let a = stored_name("report.pdf");
        let b = stored_name("report.pdf");
        assert_ne!(a, b);
        assert!(a.ends_with("report.pdf"));
    }

    #[test]
    fn stored_names_are_sanitized() {
        let name = stored_name("évil name?.png");
        assert!(name.ends_with("_vil_name_.png"));
        assert!(!name.contains(' '));
    }

    #[test]
    fn object_keys_group_by_project() {
        let project = Uuid::new_v4();
        let key = object_key(project, "x.png");
        assert_eq!(key, format!("taskify/projects/{project}/x.png"));
    }
}
