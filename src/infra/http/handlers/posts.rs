use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use uuid::Uuid;

use crate::application::pagination::{PageRequest, PostCursor, QueueCursor};
use crate::application::posts::{
    CreatePostCommand, LifecycleCommand, UpdatePostContentCommand,
};
use crate::application::repos::PostQueryFilter;
use crate::domain::types::PostStatus;

use super::super::error::ApiError;
use super::super::models::{
    FeatureRequest, LifecycleRequest, Page, PostCreateRequest, PostResponse, PostSummary,
    PostTagsRequest, PostUpdateRequest,
};
use super::super::middleware::CurrentUser;
use super::super::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PostListQuery {
    pub tag: Option<String>,
    pub category: Option<String>,
    pub author: Option<Uuid>,
    pub search: Option<String>,
    pub featured: Option<bool>,
    pub status: Option<PostStatus>,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

impl PostListQuery {
    fn filter(&self) -> PostQueryFilter {
        PostQueryFilter {
            tag: self.tag.clone(),
            category: self.category.clone(),
            author: self.author,
            search: self.search.clone(),
            featured: self.featured,
        }
    }

    fn page(&self, default_limit: i32) -> Result<PageRequest<PostCursor>, ApiError> {
        let limit = self
            .limit
            .unwrap_or_else(|| default_limit.max(1) as u32)
            .clamp(1, 100);
        let cursor = self
            .cursor
            .as_deref()
            .map(PostCursor::decode)
            .transpose()?;
        Ok(PageRequest::new(limit, cursor))
    }
}

pub async fn list_public(
    State(state): State<AppState>,
    Query(query): Query<PostListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = state.users.site_settings().await?;
    let page = state
        .posts
        .list_public(&query.filter(), query.page(settings.public_page_size)?)
        .await?;
    Ok(Json(Page::from_cursor_page(page, PostSummary::from)))
}

pub async fn get_published(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state.posts.find_published_by_slug(&slug).await?;
    Ok(Json(PostResponse::from(detail)))
}

pub async fn list_mine(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PostListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = state.users.site_settings().await?;
    let page = state
        .posts
        .list_for_author(&user, &query.filter(), query.page(settings.admin_page_size)?)
        .await?;
    Ok(Json(Page::from_cursor_page(page, PostSummary::from)))
}

pub async fn list_admin(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PostListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = state.users.site_settings().await?;
    let filter = query.filter();
    let page = state
        .posts
        .list_admin(
            &user,
            query.status,
            &filter,
            query.page(settings.admin_page_size)?,
        )
        .await?;
    Ok(Json(Page::from_cursor_page(page, PostSummary::from)))
}

pub async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<PostCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state
        .posts
        .create_post(
            &user,
            CreatePostCommand {
                title: body.title,
                excerpt: body.excerpt,
                body_markdown: body.body_markdown,
                category_id: body.category_id,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(PostResponse::from(post))))
}

pub async fn get_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state.posts.get_for_user(&user, id).await?;
    Ok(Json(PostResponse::from(detail)))
}

pub async fn update_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<PostUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state
        .posts
        .update_content(
            &user,
            UpdatePostContentCommand {
                id,
                title: body.title,
                excerpt: body.excerpt,
                body_markdown: body.body_markdown,
                category_id: body.category_id,
            },
        )
        .await?;
    Ok(Json(PostResponse::from(post)))
}

pub async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.posts.delete_post(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn apply_lifecycle(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<LifecycleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state
        .posts
        .apply_lifecycle(
            &user,
            LifecycleCommand {
                post_id: id,
                action: body.action,
                note: body.note,
                scheduled_for: body.scheduled_for,
            },
        )
        .await?;
    Ok(Json(PostResponse::from(post)))
}

pub async fn set_featured(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<FeatureRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state.posts.set_featured(&user, id, body.featured).await?;
    Ok(Json(PostResponse::from(post)))
}

pub async fn replace_tags(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<PostTagsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.posts.replace_tags(&user, id, &body.tag_ids).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

pub async fn moderation_queue(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<QueueQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = state.users.site_settings().await?;
    let limit = query
        .limit
        .unwrap_or_else(|| settings.admin_page_size.max(1) as u32)
        .clamp(1, 100);
    let cursor = query
        .cursor
        .as_deref()
        .map(QueueCursor::decode)
        .transpose()?;
    let page = state
        .moderation
        .list_queue(&user, PageRequest::new(limit, cursor))
        .await?;
    Ok(Json(Page::from_cursor_page(page, PostSummary::from)))
}

pub async fn moderation_stats(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let stats = state.moderation.queue_stats(&user).await?;
    metrics::gauge!("foglio_moderation_queue_len")
        .set((stats.submitted + stats.under_review) as f64);
    Ok(Json(stats))
}
