use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::application::pagination::{JobCursor, PageRequest, TimeCursor};
use crate::application::repos::{AuditQueryFilter, JobQueryFilter};
use crate::domain::entities::UserRecord;
use crate::domain::types::{JobState, JobType, UserRole};

use super::super::error::ApiError;
use super::super::middleware::CurrentUser;
use super::super::state::AppState;

fn require_admin(user: &UserRecord) -> Result<(), ApiError> {
    if user.role == UserRole::Admin {
        Ok(())
    } else {
        Err(ApiError::forbidden("admin role required"))
    }
}

#[derive(Debug, Deserialize)]
pub struct AuditListQuery {
    pub actor: Option<String>,
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub search: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

pub async fn list_audit_logs(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<AuditListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&user)?;

    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let cursor = query
        .cursor
        .as_deref()
        .map(TimeCursor::decode)
        .transpose()?;
    let filter = AuditQueryFilter {
        actor: query.actor,
        action: query.action,
        entity_type: query.entity_type,
        search: query.search,
    };
    let page = state
        .audit
        .list_filtered(PageRequest::new(limit, cursor), &filter)
        .await?;
    Ok(Json(page))
}

#[derive(Debug, Deserialize)]
pub struct JobsListQuery {
    pub state: Option<JobState>,
    pub job_type: Option<JobType>,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

pub async fn list_jobs(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<JobsListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&user)?;

    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let cursor = query
        .cursor
        .as_deref()
        .map(JobCursor::decode)
        .transpose()?;
    let filter = JobQueryFilter {
        state: query.state,
        job_type: query.job_type,
    };
    let page = state
        .jobs
        .list_jobs(&filter, PageRequest::new(limit, cursor))
        .await?;
    Ok(Json(page))
}

pub async fn get_job(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&user)?;

    let job = state
        .jobs
        .find_job(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;
    Ok(Json(job))
}
