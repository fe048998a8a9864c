use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Project record. Exactly one owner; all authorization flows through
/// `owner_id`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

const PROJECT_COLUMNS: &str = "id, title, description, owner_id, created_at, updated_at";

impl Project {
    pub async fn create(
        db: &PgPool,
        owner_id: Uuid,
        title: &str,
        description: Option<&str>,
    ) -> anyhow::Result<Project> {
        let project = sqlx::query_as::<_, Project>(&format!(
            "INSERT INTO projects (title, description, owner_id)
             VALUES ($1, $2, $3)
             RETURNING {PROJECT_COLUMNS}"
        ))
        .bind(title)
        .bind(description)
        .bind(owner_id)
        .fetch_one(db)
        .await?;
        Ok(project)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Project>> {
        let project = sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(project)
    }

    pub async fn list_by_owner(db: &PgPool, owner_id: Uuid) -> anyhow::Result<Vec<Project>> {
        let rows = sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects
             WHERE owner_id = $1
             ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn update(
        db: &PgPool,
        id: Uuid,
        title: &str,
        description: Option<&str>,
    ) -> anyhow::Result<Project> {
        let project = sqlx::query_as::<_, Project>(&format!(
            "UPDATE projects
             SET title = $2, description = $3, updated_at = now()
             WHERE id = $1
             RETURNING {PROJECT_COLUMNS}"
        ))
        .bind(id)
        .bind(title)
        .bind(description)
        .fetch_one(db)
        .await?;
        Ok(project)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}
