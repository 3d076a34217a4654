use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use uuid::Uuid;

use crate::application::pagination::{PageRequest, TimeCursor};
use crate::domain::entities::UserRecord;
use crate::domain::types::{ReactionKind, UserRole};

use super::super::error::ApiError;
use super::super::models::{
    BookmarkedPostResponse, CommentCreateRequest, CommentStatusRequest, Page, ReactionsResponse,
};
use super::super::middleware::CurrentUser;
use super::super::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TimePageQuery {
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

impl TimePageQuery {
    fn page(&self, default_limit: i32) -> Result<PageRequest<TimeCursor>, ApiError> {
        let limit = self
            .limit
            .unwrap_or_else(|| default_limit.max(1) as u32)
            .clamp(1, 100);
        let cursor = self
            .cursor
            .as_deref()
            .map(TimeCursor::decode)
            .transpose()?;
        Ok(PageRequest::new(limit, cursor))
    }
}

// -------- Comments --------

pub async fn list_comments(
    State(state): State<AppState>,
    viewer: Option<Extension<UserRecord>>,
    Path(post_id): Path<Uuid>,
    Query(query): Query<TimePageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = state.users.site_settings().await?;
    let viewer_is_admin = viewer
        .map(|Extension(user)| user.role == UserRole::Admin)
        .unwrap_or(false);
    let page = state
        .comments
        .list_for_post(
            post_id,
            viewer_is_admin,
            query.page(settings.public_page_size)?,
        )
        .await?;
    Ok(Json(page))
}

pub async fn create_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<Uuid>,
    Json(body): Json<CommentCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = state
        .comments
        .create(&user, post_id, body.parent_id, body.body_markdown)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.comments.delete_own(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_comment_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<CommentStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = state.comments.set_status(&user, id, body.status).await?;
    Ok(Json(comment))
}

// -------- Reactions --------

pub async fn toggle_reaction(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((post_id, kind)): Path<(Uuid, ReactionKind)>,
) -> Result<impl IntoResponse, ApiError> {
    let added = state.reactions.toggle(&user, post_id, kind).await?;
    Ok(Json(serde_json::json!({ "active": added })))
}

pub async fn post_reactions(
    State(state): State<AppState>,
    viewer: Option<Extension<UserRecord>>,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let counts = state.reactions.counts(post_id).await?;
    let mine = match viewer {
        Some(Extension(user)) => state.reactions.mine(&user, post_id).await?,
        None => Vec::new(),
    };
    Ok(Json(ReactionsResponse { counts, mine }))
}

// -------- Bookmarks --------

pub async fn add_bookmark(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.bookmarks.add(&user, post_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_bookmark(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.bookmarks.remove(&user, post_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_bookmarks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<TimePageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = state.users.site_settings().await?;
    let page = state
        .bookmarks
        .list(&user, query.page(settings.public_page_size)?)
        .await?;
    Ok(Json(Page::from_cursor_page(page, BookmarkedPostResponse::from)))
}
