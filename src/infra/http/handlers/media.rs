use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use uuid::Uuid;

use crate::application::media::RegisterMediaCommand;
use crate::application::pagination::{PageRequest, TimeCursor};
use crate::application::repos::MediaQueryFilter;

use super::super::error::ApiError;
use super::super::models::{AltTextRequest, MediaRegisterRequest};
use super::super::middleware::CurrentUser;
use super::super::state::AppState;

pub async fn register_media(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<MediaRegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let media = state
        .media
        .register(
            &user,
            RegisterMediaCommand {
                filename: body.filename,
                content_type: body.content_type,
                size_bytes: body.size_bytes,
                cdn_url: body.cdn_url,
                alt_text: body.alt_text,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(media)))
}

#[derive(Debug, Deserialize)]
pub struct MediaListQuery {
    pub owner: Option<Uuid>,
    pub content_type: Option<String>,
    pub search: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

pub async fn list_media(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<MediaListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = state.users.site_settings().await?;
    let limit = query
        .limit
        .unwrap_or_else(|| settings.admin_page_size.max(1) as u32)
        .clamp(1, 100);
    let cursor = query
        .cursor
        .as_deref()
        .map(TimeCursor::decode)
        .transpose()?;
    let filter = MediaQueryFilter {
        owner: query.owner,
        content_type: query.content_type,
        search: query.search,
    };
    let page = state
        .media
        .list(&user, filter, PageRequest::new(limit, cursor))
        .await?;
    Ok(Json(page))
}

pub async fn update_alt_text(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<AltTextRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let media = state.media.update_alt_text(&user, id, body.alt_text).await?;
    Ok(Json(media))
}

pub async fn delete_media(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.media.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
