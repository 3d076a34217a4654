use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::domain::types::CollaboratorPermission;

use super::super::error::ApiError;
use super::super::models::GrantRequest;
use super::super::middleware::CurrentUser;
use super::super::state::AppState;

pub async fn list_collaborators(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let grants = state.collaborators.list(&user, post_id).await?;
    Ok(Json(grants))
}

pub async fn grant_collaborator(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<Uuid>,
    Json(body): Json<GrantRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let grant = state
        .collaborators
        .grant(&user, post_id, body.user_id, body.permission)
        .await?;
    Ok((StatusCode::CREATED, Json(grant)))
}

pub async fn revoke_collaborator(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((post_id, grantee_id, permission)): Path<(Uuid, Uuid, CollaboratorPermission)>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .collaborators
        .revoke(&user, post_id, grantee_id, permission)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
