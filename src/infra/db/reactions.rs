use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{ReactionsRepo, RepoError};
use crate::domain::entities::ReactionCount;
use crate::domain::types::ReactionKind;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct CountRow {
    kind: ReactionKind,
    count: i64,
}

#[async_trait]
impl ReactionsRepo for PostgresRepositories {
    async fn toggle(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        kind: ReactionKind,
    ) -> Result<bool, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let removed = sqlx::query(
            "DELETE FROM reactions WHERE post_id = $1 AND user_id = $2 AND kind = $3",
        )
        .bind(post_id)
        .bind(user_id)
        .bind(kind)
        .execute(tx.as_mut())
        .await
        .map_err(map_sqlx_error)?;

        let now_set = if removed.rows_affected() == 0 {
            sqlx::query(
                "INSERT INTO reactions (post_id, user_id, kind, created_at) \
                 VALUES ($1, $2, $3, now())",
            )
            .bind(post_id)
            .bind(user_id)
            .bind(kind)
            .execute(tx.as_mut())
            .await
            .map_err(map_sqlx_error)?;
            true
        } else {
            false
        };

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(now_set)
    }

    async fn counts_for_post(&self, post_id: Uuid) -> Result<Vec<ReactionCount>, RepoError> {
        let rows = sqlx::query_as::<_, CountRow>(
            "SELECT kind, COUNT(*) AS count FROM reactions \
             WHERE post_id = $1 GROUP BY kind ORDER BY kind",
        )
        .bind(post_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| ReactionCount {
                kind: row.kind,
                count: row.count.max(0) as u64,
            })
            .collect())
    }

    async fn kinds_for_user(
        &self,
        post_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<ReactionKind>, RepoError> {
        let kinds: Vec<ReactionKind> = sqlx::query_scalar(
            "SELECT kind FROM reactions WHERE post_id = $1 AND user_id = $2 ORDER BY kind",
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(kinds)
    }
}
