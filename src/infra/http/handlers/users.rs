use std::str::FromStr;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{PageRequest, TimeCursor};
use crate::application::repos::UserQueryFilter;
use crate::domain::entities::SiteSettingsRecord;
use crate::domain::types::UserRole;

use super::super::error::ApiError;
use super::super::models::{
    Page, RoleRequest, SettingsResponse, SettingsUpdateRequest, SuspendRequest, UserResponse,
};
use super::super::middleware::CurrentUser;
use super::super::state::AppState;

pub async fn me(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    Json(user)
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub role: Option<UserRole>,
    pub suspended: Option<bool>,
    pub search: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    Query(query): Query<UserListQuery>,
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
    let filter = UserQueryFilter {
        role: query.role,
        suspended: query.suspended,
        search: query.search,
    };
    let page = state
        .users
        .list(&admin, &filter, PageRequest::new(limit, cursor))
        .await?;
    Ok(Json(Page::from_cursor_page(page, UserResponse::from)))
}

pub async fn set_role(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<RoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.users.set_role(&admin, id, body.role).await?;
    Ok(Json(UserResponse::from(user)))
}

pub async fn set_suspended(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<SuspendRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .users
        .set_suspended(&admin, id, body.suspended)
        .await?;
    Ok(Json(UserResponse::from(user)))
}

pub async fn get_settings(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let settings = state.users.site_settings().await?;
    Ok(Json(SettingsResponse::from(settings)))
}

pub async fn update_settings(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    Json(body): Json<SettingsUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let timezone = chrono_tz::Tz::from_str(&body.timezone)
        .map_err(|_| ApiError::bad_request(format!("unknown timezone `{}`", body.timezone)))?;

    let settings = SiteSettingsRecord {
        site_title: body.site_title,
        public_page_size: body.public_page_size,
        admin_page_size: body.admin_page_size,
        comments_enabled: body.comments_enabled,
        max_collaborators_per_post: body.max_collaborators_per_post,
        timezone,
        updated_at: OffsetDateTime::now_utc(),
    };
    state.users.update_site_settings(&admin, settings).await?;

    let stored = state.users.site_settings().await?;
    Ok(Json(SettingsResponse::from(stored)))
}
