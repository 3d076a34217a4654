use async_trait::async_trait;
use sqlx::QueryBuilder;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{CursorPage, PageRequest, TimeCursor};
use crate::application::repos::{CommentsRepo, CreateCommentParams, RepoError};
use crate::domain::entities::CommentRecord;
use crate::domain::types::CommentStatus;

use super::{PostgresRepositories, map_sqlx_error};

const COMMENT_COLUMNS: &str =
    "id, post_id, author_id, parent_id, body_markdown, body_html, status, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    post_id: Uuid,
    author_id: Uuid,
    parent_id: Option<Uuid>,
    body_markdown: String,
    body_html: String,
    status: CommentStatus,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            author_id: row.author_id,
            parent_id: row.parent_id,
            body_markdown: row.body_markdown,
            body_html: row.body_html,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl CommentsRepo for PostgresRepositories {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            "INSERT INTO comments \
             (id, post_id, author_id, parent_id, body_markdown, body_html, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, 'visible'::comment_status, now(), now()) \
             RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(params.post_id)
        .bind(params.author_id)
        .bind(params.parent_id)
        .bind(params.body_markdown)
        .bind(params.body_html)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(CommentRecord::from))
    }

    async fn list_for_post(
        &self,
        post_id: Uuid,
        include_hidden: bool,
        page: PageRequest<TimeCursor>,
    ) -> Result<CursorPage<CommentRecord>, RepoError> {
        let limit = page.limit.clamp(1, 200);
        let mut qb = QueryBuilder::new(format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = "
        ));
        qb.push_bind(post_id);

        if !include_hidden {
            qb.push(" AND status <> 'hidden'::comment_status");
        }

        if let Some(cursor) = page.cursor {
            qb.push(" AND (created_at < ");
            qb.push_bind(cursor.created_at);
            qb.push(" OR (created_at = ");
            qb.push_bind(cursor.created_at);
            qb.push(" AND id < ");
            qb.push_bind(cursor.id);
            qb.push("))");
        }

        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        qb.push_bind(limit as i64);

        let rows = qb
            .build_query_as::<CommentRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let records: Vec<CommentRecord> = rows.into_iter().map(CommentRecord::from).collect();
        let next_cursor = if records.len() as u32 == limit {
            records
                .last()
                .map(|comment| TimeCursor::new(comment.created_at, comment.id).encode())
        } else {
            None
        };

        Ok(CursorPage::new(records, next_cursor))
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: CommentStatus,
    ) -> Result<CommentRecord, RepoError> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            "UPDATE comments SET status = $2, updated_at = now() WHERE id = $1 \
             RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Ok(row.into())
    }
}
