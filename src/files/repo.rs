use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Attachment metadata. The bytes themselves live in object storage under
/// `public_id`; authorization is derived from the parent project's owner,
/// not from `uploaded_by`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct File {
    pub id: Uuid,
    pub original_name: String,
    pub stored_name: String,
    pub mime_type: String,
    pub size: i64,
    pub url: String,
    pub public_id: String,
    pub project_id: Uuid,
    pub uploaded_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// File joined with the owning project, for guard checks on single-file
/// reads and deletes.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FileWithProject {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub file: File,
    #[serde(skip_serializing)]
    pub project_owner_id: Uuid,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FileStats {
    pub total_files: i64,
    pub total_size: i64,
}

pub struct CreateFileData<'a> {
    pub original_name: &'a str,
    pub stored_name: &'a str,
    pub mime_type: &'a str,
    pub size: i64,
    pub url: &'a str,
    pub public_id: &'a str,
    pub project_id: Uuid,
    pub uploaded_by: Uuid,
}

const FILE_COLUMNS: &str = "id, original_name, stored_name, mime_type, size, url, \
                            public_id, project_id, uploaded_by, created_at";

impl File {
    pub async fn create(db: &PgPool, data: CreateFileData<'_>) -> anyhow::Result<File> {
        let file = sqlx::query_as::<_, File>(&format!(
            "INSERT INTO files
                 (original_name, stored_name, mime_type, size, url, public_id,
                  project_id, uploaded_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {FILE_COLUMNS}"
        ))
        .bind(data.original_name)
        .bind(data.stored_name)
        .bind(data.mime_type)
        .bind(data.size)
        .bind(data.url)
        .bind(data.public_id)
        .bind(data.project_id)
        .bind(data.uploaded_by)
        .fetch_one(db)
        .await?;
        Ok(file)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<FileWithProject>> {
        let file = sqlx::query_as::<_, FileWithProject>(
            "SELECT f.id, f.original_name, f.stored_name, f.mime_type, f.size,
                    f.url, f.public_id, f.project_id, f.uploaded_by, f.created_at,
                    p.owner_id AS project_owner_id
             FROM files f
             JOIN projects p ON p.id = f.project_id
             WHERE f.id = $1",
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(file)
    }

    pub async fn list_by_project(db: &PgPool, project_id: Uuid) -> anyhow::Result<Vec<File>> {
        let rows = sqlx::query_as::<_, File>(&format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE project_id = $1
             ORDER BY created_at DESC"
        ))
        .bind(project_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn project_stats(db: &PgPool, project_id: Uuid) -> anyhow::Result<FileStats> {
        let stats = sqlx::query_as::<_, FileStats>(
            "SELECT COUNT(*) AS total_files,
                    COALESCE(SUM(size), 0)::BIGINT AS total_size
             FROM files WHERE project_id = $1",
        )
        .bind(project_id)
        .fetch_one(db)
        .await?;
        Ok(stats)
    }

    pub async fn user_stats(db: &PgPool, user_id: Uuid) -> anyhow::Result<FileStats> {
        let stats = sqlx::query_as::<_, FileStats>(
            "SELECT COUNT(*) AS total_files,
                    COALESCE(SUM(size), 0)::BIGINT AS total_size
             FROM files WHERE uploaded_by = $1",
        )
        .bind(user_id)
        .fetch_one(db)
        .await?;
        Ok(stats)
    }
}
