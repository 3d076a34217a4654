use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CollaboratorsRepo, RepoError};
use crate::domain::entities::CollaboratorGrantRecord;
use crate::domain::types::CollaboratorPermission;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct GrantRow {
    post_id: Uuid,
    user_id: Uuid,
    permission: CollaboratorPermission,
    granted_by: Uuid,
    created_at: OffsetDateTime,
}

impl From<GrantRow> for CollaboratorGrantRecord {
    fn from(row: GrantRow) -> Self {
        Self {
            post_id: row.post_id,
            user_id: row.user_id,
            permission: row.permission,
            granted_by: row.granted_by,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl CollaboratorsRepo for PostgresRepositories {
    async fn list_for_post(
        &self,
        post_id: Uuid,
    ) -> Result<Vec<CollaboratorGrantRecord>, RepoError> {
        let rows = sqlx::query_as::<_, GrantRow>(
            "SELECT post_id, user_id, permission, granted_by, created_at \
             FROM post_collaborators WHERE post_id = $1 \
             ORDER BY created_at ASC",
        )
        .bind(post_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_for_user_on_post(
        &self,
        post_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<CollaboratorGrantRecord>, RepoError> {
        let rows = sqlx::query_as::<_, GrantRow>(
            "SELECT post_id, user_id, permission, granted_by, created_at \
             FROM post_collaborators WHERE post_id = $1 AND user_id = $2",
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn grant(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        permission: CollaboratorPermission,
        granted_by: Uuid,
    ) -> Result<CollaboratorGrantRecord, RepoError> {
        let row = sqlx::query_as::<_, GrantRow>(
            "INSERT INTO post_collaborators (post_id, user_id, permission, granted_by, created_at) \
             VALUES ($1, $2, $3, $4, now()) \
             ON CONFLICT (post_id, user_id, permission) DO UPDATE SET granted_by = EXCLUDED.granted_by \
             RETURNING post_id, user_id, permission, granted_by, created_at",
        )
        .bind(post_id)
        .bind(user_id)
        .bind(permission)
        .bind(granted_by)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn revoke(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        permission: CollaboratorPermission,
    ) -> Result<bool, RepoError> {
        let result = sqlx::query(
            "DELETE FROM post_collaborators \
             WHERE post_id = $1 AND user_id = $2 AND permission = $3",
        )
        .bind(post_id)
        .bind(user_id)
        .bind(permission)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_for_post(&self, post_id: Uuid) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT user_id) FROM post_collaborators WHERE post_id = $1",
        )
        .bind(post_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(count.max(0) as u64)
    }
}
