use async_trait::async_trait;
use sqlx::QueryBuilder;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{CursorPage, PageRequest, TimeCursor};
use crate::application::repos::{CreateMediaParams, MediaQueryFilter, MediaRepo, RepoError};
use crate::domain::entities::MediaRecord;

use super::{PostgresRepositories, map_sqlx_error};

const MEDIA_COLUMNS: &str =
    "id, owner_id, filename, content_type, size_bytes, cdn_url, alt_text, created_at";

#[derive(sqlx::FromRow)]
struct MediaRow {
    id: Uuid,
    owner_id: Uuid,
    filename: String,
    content_type: String,
    size_bytes: i64,
    cdn_url: String,
    alt_text: Option<String>,
    created_at: OffsetDateTime,
}

impl From<MediaRow> for MediaRecord {
    fn from(row: MediaRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            filename: row.filename,
            content_type: row.content_type,
            size_bytes: row.size_bytes,
            cdn_url: row.cdn_url,
            alt_text: row.alt_text,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl MediaRepo for PostgresRepositories {
    async fn insert_media(&self, params: CreateMediaParams) -> Result<MediaRecord, RepoError> {
        let row = sqlx::query_as::<_, MediaRow>(&format!(
            "INSERT INTO media (id, owner_id, filename, content_type, size_bytes, cdn_url, alt_text, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, now()) \
             RETURNING {MEDIA_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(params.owner_id)
        .bind(params.filename)
        .bind(params.content_type)
        .bind(params.size_bytes)
        .bind(params.cdn_url)
        .bind(params.alt_text)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn find_media(&self, id: Uuid) -> Result<Option<MediaRecord>, RepoError> {
        let row = sqlx::query_as::<_, MediaRow>(&format!(
            "SELECT {MEDIA_COLUMNS} FROM media WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }

    async fn update_alt_text(
        &self,
        id: Uuid,
        alt_text: Option<String>,
    ) -> Result<MediaRecord, RepoError> {
        let row = sqlx::query_as::<_, MediaRow>(&format!(
            "UPDATE media SET alt_text = $2 WHERE id = $1 RETURNING {MEDIA_COLUMNS}"
        ))
        .bind(id)
        .bind(alt_text)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Ok(row.into())
    }

    async fn list_media(
        &self,
        filter: &MediaQueryFilter,
        page: PageRequest<TimeCursor>,
    ) -> Result<CursorPage<MediaRecord>, RepoError> {
        let limit = page.limit.clamp(1, 200);
        let mut qb = QueryBuilder::new(format!(
            "SELECT {MEDIA_COLUMNS} FROM media WHERE 1=1 "
        ));

        if let Some(owner) = filter.owner {
            qb.push(" AND owner_id = ");
            qb.push_bind(owner);
        }

        if let Some(content_type) = filter.content_type.as_ref() {
            qb.push(" AND content_type = ");
            qb.push_bind(content_type);
        }

        if let Some(search) = filter.search.as_ref() {
            qb.push(" AND filename ILIKE ");
            qb.push_bind(format!("%{}%", search));
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
            .build_query_as::<MediaRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let records: Vec<MediaRecord> = rows.into_iter().map(MediaRecord::from).collect();
        let next_cursor = if records.len() as u32 == limit {
            records
                .last()
                .map(|media| TimeCursor::new(media.created_at, media.id).encode())
        } else {
            None
        };

        Ok(CursorPage::new(records, next_cursor))
    }

    async fn delete_media(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM media WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
