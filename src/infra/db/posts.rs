use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{CursorPage, PageRequest, PostCursor, PostScope, QueueCursor};
use crate::application::repos::{
    CreatePostParams, PostListScope, PostQueryFilter, PostsRepo, PostsWriteRepo, RepoError,
    UpdatePostParams, UpdatePostStatusParams,
};
use crate::domain::entities::PostRecord;
use crate::domain::types::PostStatus;

use super::{PostgresRepositories, map_sqlx_error};

const POST_COLUMNS: &str = "p.id, p.author_id, p.slug, p.title, p.excerpt, p.body_markdown, \
     p.body_html, p.status, p.category_id, p.featured, p.review_note, p.submitted_at, \
     p.reviewed_at, p.reviewed_by, p.scheduled_for, p.published_at, p.archived_at, \
     p.created_at, p.updated_at";

// Same column list without the alias, for RETURNING clauses.
const POST_COLUMNS_PLAIN: &str = "id, author_id, slug, title, excerpt, body_markdown, \
     body_html, status, category_id, featured, review_note, submitted_at, \
     reviewed_at, reviewed_by, scheduled_for, published_at, archived_at, \
     created_at, updated_at";

#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    author_id: Uuid,
    slug: String,
    title: String,
    excerpt: String,
    body_markdown: String,
    body_html: String,
    status: PostStatus,
    category_id: Option<Uuid>,
    featured: bool,
    review_note: Option<String>,
    submitted_at: Option<OffsetDateTime>,
    reviewed_at: Option<OffsetDateTime>,
    reviewed_by: Option<Uuid>,
    scheduled_for: Option<OffsetDateTime>,
    published_at: Option<OffsetDateTime>,
    archived_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            author_id: row.author_id,
            slug: row.slug,
            title: row.title,
            excerpt: row.excerpt,
            body_markdown: row.body_markdown,
            body_html: row.body_html,
            status: row.status,
            category_id: row.category_id,
            featured: row.featured,
            review_note: row.review_note,
            submitted_at: row.submitted_at,
            reviewed_at: row.reviewed_at,
            reviewed_by: row.reviewed_by,
            scheduled_for: row.scheduled_for,
            published_at: row.published_at,
            archived_at: row.archived_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn sort_column(scope: PostListScope) -> &'static str {
    match scope {
        PostListScope::Public => "p.published_at",
        _ => "p.updated_at",
    }
}

fn apply_scope_conditions(qb: &mut QueryBuilder<'_, Postgres>, scope: PostListScope) {
    match scope {
        PostListScope::Public => {
            qb.push(" AND p.status = ");
            qb.push_bind(PostStatus::Published);
            qb.push(" AND p.published_at IS NOT NULL ");
        }
        PostListScope::Author { user_id, status } => {
            qb.push(" AND (p.author_id = ");
            qb.push_bind(user_id);
            qb.push(
                " OR EXISTS (SELECT 1 FROM post_collaborators pc \
                 WHERE pc.post_id = p.id AND pc.user_id = ",
            );
            qb.push_bind(user_id);
            qb.push("))");
            if let Some(status) = status {
                qb.push(" AND p.status = ");
                qb.push_bind(status);
            }
        }
        PostListScope::Admin { status } => {
            if let Some(status) = status {
                qb.push(" AND p.status = ");
                qb.push_bind(status);
            }
        }
    }
}

fn apply_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &'q PostQueryFilter) {
    if let Some(tag) = filter.tag.as_ref() {
        qb.push(
            " AND EXISTS (SELECT 1 FROM post_tags pt INNER JOIN tags t ON t.id = pt.tag_id \
             WHERE pt.post_id = p.id AND t.slug = ",
        );
        qb.push_bind(tag);
        qb.push(")");
    }

    if let Some(category) = filter.category.as_ref() {
        qb.push(
            " AND EXISTS (SELECT 1 FROM categories c \
             WHERE c.id = p.category_id AND c.slug = ",
        );
        qb.push_bind(category);
        qb.push(")");
    }

    if let Some(author) = filter.author {
        qb.push(" AND p.author_id = ");
        qb.push_bind(author);
    }

    if let Some(featured) = filter.featured {
        qb.push(" AND p.featured = ");
        qb.push_bind(featured);
    }

    if let Some(search) = filter.search.as_ref() {
        let pattern = format!("%{}%", search);
        qb.push(" AND (p.title ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR p.slug ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR p.excerpt ILIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn list_posts(
        &self,
        scope: PostListScope,
        filter: &PostQueryFilter,
        page: PageRequest<PostCursor>,
    ) -> Result<CursorPage<PostRecord>, RepoError> {
        let limit = page.limit.clamp(1, 100);
        let sort = sort_column(scope);

        let mut qb = QueryBuilder::new(format!(
            "SELECT {POST_COLUMNS} FROM posts p WHERE 1=1 "
        ));
        apply_scope_conditions(&mut qb, scope);
        apply_filter(&mut qb, filter);

        if let Some(cursor) = page.cursor {
            qb.push(format!(" AND ({sort} < "));
            qb.push_bind(cursor.sort_key);
            qb.push(format!(" OR ({sort} = "));
            qb.push_bind(cursor.sort_key);
            qb.push(" AND p.id < ");
            qb.push_bind(cursor.id);
            qb.push("))");
        }

        qb.push(format!(" ORDER BY {sort} DESC, p.id DESC LIMIT "));
        qb.push_bind(limit as i64);

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let records: Vec<PostRecord> = rows.into_iter().map(PostRecord::from).collect();
        let next_cursor = if records.len() as u32 == limit {
            records.last().map(|post| {
                let (cursor_scope, sort_key) = match scope {
                    PostListScope::Public => (
                        PostScope::Public,
                        post.published_at.unwrap_or(post.updated_at),
                    ),
                    PostListScope::Author { .. } => (PostScope::Author, post.updated_at),
                    PostListScope::Admin { .. } => (PostScope::Admin, post.updated_at),
                };
                PostCursor {
                    scope: cursor_scope,
                    status: match scope {
                        PostListScope::Public => Some(PostStatus::Published),
                        PostListScope::Author { status, .. }
                        | PostListScope::Admin { status } => status,
                    },
                    sort_key,
                    id: post.id,
                }
                .encode()
            })
        } else {
            None
        };

        Ok(CursorPage::new(records, next_cursor))
    }

    async fn count_posts(
        &self,
        scope: PostListScope,
        filter: &PostQueryFilter,
    ) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM posts p WHERE 1=1 ");
        apply_scope_conditions(&mut qb, scope);
        apply_filter(&mut qb, filter);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(count.max(0) as u64)
    }

    async fn list_moderation_queue(
        &self,
        page: PageRequest<QueueCursor>,
    ) -> Result<CursorPage<PostRecord>, RepoError> {
        let limit = page.limit.clamp(1, 100);

        let mut qb = QueryBuilder::new(format!(
            "SELECT {POST_COLUMNS} FROM posts p \
             WHERE p.status IN ('submitted'::post_status, 'under_review'::post_status) \
             AND p.submitted_at IS NOT NULL "
        ));

        if let Some(cursor) = page.cursor {
            qb.push(" AND (p.submitted_at > ");
            qb.push_bind(cursor.submitted_at);
            qb.push(" OR (p.submitted_at = ");
            qb.push_bind(cursor.submitted_at);
            qb.push(" AND p.id > ");
            qb.push_bind(cursor.id);
            qb.push("))");
        }

        qb.push(" ORDER BY p.submitted_at ASC, p.id ASC LIMIT ");
        qb.push_bind(limit as i64);

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let records: Vec<PostRecord> = rows.into_iter().map(PostRecord::from).collect();
        let next_cursor = if records.len() as u32 == limit {
            records.last().and_then(|post| {
                post.submitted_at
                    .map(|at| QueueCursor::new(at, post.id).encode())
            })
        } else {
            None
        };

        Ok(CursorPage::new(records, next_cursor))
    }

    async fn list_due_scheduled(
        &self,
        now: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {POST_COLUMNS} FROM posts p \
             WHERE p.status = 'scheduled'::post_status AND p.scheduled_for <= "
        ));
        qb.push_bind(now);
        qb.push(" ORDER BY p.scheduled_for ASC LIMIT ");
        qb.push_bind(limit.clamp(1, 500) as i64);

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts p WHERE p.slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "INSERT INTO posts \
             (id, author_id, slug, title, excerpt, body_markdown, body_html, status, \
              category_id, featured, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'draft'::post_status, $8, FALSE, now(), now()) \
             RETURNING {POST_COLUMNS_PLAIN}"
        ))
        .bind(Uuid::new_v4())
        .bind(params.author_id)
        .bind(params.slug)
        .bind(params.title)
        .bind(params.excerpt)
        .bind(params.body_markdown)
        .bind(params.body_html)
        .bind(params.category_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "UPDATE posts SET \
             slug = $2, title = $3, excerpt = $4, body_markdown = $5, body_html = $6, \
             category_id = $7, featured = $8, updated_at = now() \
             WHERE id = $1 \
             RETURNING {POST_COLUMNS_PLAIN}"
        ))
        .bind(params.id)
        .bind(params.slug)
        .bind(params.title)
        .bind(params.excerpt)
        .bind(params.body_markdown)
        .bind(params.body_html)
        .bind(params.category_id)
        .bind(params.featured)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Ok(row.into())
    }

    async fn update_post_status(
        &self,
        params: UpdatePostStatusParams,
    ) -> Result<PostRecord, RepoError> {
        let change = params.change;
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "UPDATE posts SET \
             status = $2, submitted_at = $3, reviewed_at = $4, reviewed_by = $5, \
             review_note = $6, scheduled_for = $7, published_at = $8, archived_at = $9, \
             updated_at = now() \
             WHERE id = $1 \
             RETURNING {POST_COLUMNS_PLAIN}"
        ))
        .bind(params.id)
        .bind(change.status)
        .bind(change.submitted_at)
        .bind(change.reviewed_at)
        .bind(change.reviewed_by)
        .bind(change.review_note)
        .bind(change.scheduled_for)
        .bind(change.published_at)
        .bind(change.archived_at)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Ok(row.into())
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn replace_post_tags(&self, post_id: Uuid, tag_ids: &[Uuid]) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
            .bind(post_id)
            .execute(tx.as_mut())
            .await
            .map_err(map_sqlx_error)?;

        for tag_id in tag_ids {
            sqlx::query("INSERT INTO post_tags (post_id, tag_id) VALUES ($1, $2)")
                .bind(post_id)
                .bind(tag_id)
                .execute(tx.as_mut())
                .await
                .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }
}
