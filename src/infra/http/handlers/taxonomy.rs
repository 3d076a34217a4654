use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::taxonomy::{UpsertCategoryCommand, UpsertTagCommand};

use super::super::error::ApiError;
use super::super::models::{CategoryUpsertRequest, TagUpsertRequest};
use super::super::middleware::CurrentUser;
use super::super::state::AppState;

pub async fn list_tags(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.taxonomy.list_tags().await?))
}

pub async fn create_tag(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<TagUpsertRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tag = state
        .taxonomy
        .create_tag(
            &user,
            UpsertTagCommand {
                name: body.name,
                description: body.description,
                pinned: body.pinned,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

pub async fn update_tag(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<TagUpsertRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tag = state
        .taxonomy
        .update_tag(
            &user,
            id,
            UpsertTagCommand {
                name: body.name,
                description: body.description,
                pinned: body.pinned,
            },
        )
        .await?;
    Ok(Json(tag))
}

pub async fn delete_tag(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.taxonomy.delete_tag(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.taxonomy.list_categories().await?))
}

pub async fn create_category(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CategoryUpsertRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state
        .taxonomy
        .create_category(
            &user,
            UpsertCategoryCommand {
                name: body.name,
                description: body.description,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<CategoryUpsertRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state
        .taxonomy
        .update_category(
            &user,
            id,
            UpsertCategoryCommand {
                name: body.name,
                description: body.description,
            },
        )
        .await?;
    Ok(Json(category))
}

pub async fn delete_category(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.taxonomy.delete_category(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
