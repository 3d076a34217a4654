use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::RepoError;
use crate::domain::lifecycle::{LifecycleAction, LifecycleError};
use crate::domain::types::PostStatus;

#[derive(Debug, Error)]
pub enum PostError {
    #[error("{0}")]
    ConstraintViolation(&'static str),
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    #[error("post not found")]
    NotFound,
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Serialize)]
pub struct PostSnapshot<'a> {
    pub slug: &'a str,
    pub title: &'a str,
    pub status: PostStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct LifecycleSnapshot<'a> {
    pub slug: &'a str,
    pub action: LifecycleAction,
    pub from: PostStatus,
    pub to: PostStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct CreatePostCommand {
    pub title: String,
    pub excerpt: String,
    pub body_markdown: String,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostContentCommand {
    pub id: Uuid,
    pub title: String,
    pub excerpt: String,
    pub body_markdown: String,
    pub category_id: Option<Uuid>,
}

/// A lifecycle action requested over the API.
#[derive(Debug, Clone)]
pub struct LifecycleCommand {
    pub post_id: Uuid,
    pub action: LifecycleAction,
    pub note: Option<String>,
    pub scheduled_for: Option<OffsetDateTime>,
}

pub fn ensure_non_empty(value: &str, field: &'static str) -> Result<(), PostError> {
    if value.trim().is_empty() {
        return Err(PostError::ConstraintViolation(field));
    }
    Ok(())
}
