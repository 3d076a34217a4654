use async_trait::async_trait;
use sqlx::QueryBuilder;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{CursorPage, PageRequest, TimeCursor};
use crate::application::repos::{BookmarksRepo, RepoError};
use crate::domain::entities::BookmarkRecord;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct BookmarkRow {
    user_id: Uuid,
    post_id: Uuid,
    created_at: OffsetDateTime,
}

impl From<BookmarkRow> for BookmarkRecord {
    fn from(row: BookmarkRow) -> Self {
        Self {
            user_id: row.user_id,
            post_id: row.post_id,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl BookmarksRepo for PostgresRepositories {
    async fn add(&self, user_id: Uuid, post_id: Uuid) -> Result<BookmarkRecord, RepoError> {
        let row = sqlx::query_as::<_, BookmarkRow>(
            "INSERT INTO bookmarks (user_id, post_id, created_at) VALUES ($1, $2, now()) \
             ON CONFLICT (user_id, post_id) DO UPDATE SET user_id = EXCLUDED.user_id \
             RETURNING user_id, post_id, created_at",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn remove(&self, user_id: Uuid, post_id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM bookmarks WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        page: PageRequest<TimeCursor>,
    ) -> Result<CursorPage<BookmarkRecord>, RepoError> {
        let limit = page.limit.clamp(1, 100);
        let mut qb = QueryBuilder::new(
            "SELECT user_id, post_id, created_at FROM bookmarks WHERE user_id = ",
        );
        qb.push_bind(user_id);

        if let Some(cursor) = page.cursor {
            qb.push(" AND (created_at < ");
            qb.push_bind(cursor.created_at);
            qb.push(" OR (created_at = ");
            qb.push_bind(cursor.created_at);
            qb.push(" AND post_id < ");
            qb.push_bind(cursor.id);
            qb.push("))");
        }

        qb.push(" ORDER BY created_at DESC, post_id DESC LIMIT ");
        qb.push_bind(limit as i64);

        let rows = qb
            .build_query_as::<BookmarkRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let records: Vec<BookmarkRecord> = rows.into_iter().map(BookmarkRecord::from).collect();
        let next_cursor = if records.len() as u32 == limit {
            records
                .last()
                .map(|bookmark| TimeCursor::new(bookmark.created_at, bookmark.post_id).encode())
        } else {
            None
        };

        Ok(CursorPage::new(records, next_cursor))
    }

    async fn exists(&self, user_id: Uuid, post_id: Uuid) -> Result<bool, RepoError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM bookmarks WHERE user_id = $1 AND post_id = $2)",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(exists)
    }
}
