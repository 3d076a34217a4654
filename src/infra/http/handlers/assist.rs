use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;

use super::super::error::ApiError;
use super::super::models::{
    AssistCoverRequest, AssistOutlineRequest, AssistTitlesRequest, AssistToneRequest,
};
use super::super::middleware::CurrentUser;
use super::super::state::AppState;

pub async fn suggest_titles(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<AssistTitlesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    metrics::counter!("foglio_assist_requests_total", "kind" => "titles").increment(1);
    let titles = state.assist.suggest_titles(&user, &body.body_markdown).await?;
    Ok(Json(serde_json::json!({ "titles": titles })))
}

pub async fn outline(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<AssistOutlineRequest>,
) -> Result<impl IntoResponse, ApiError> {
    metrics::counter!("foglio_assist_requests_total", "kind" => "outline").increment(1);
    let sections = state.assist.outline(&user, &body.topic).await?;
    Ok(Json(serde_json::json!({ "sections": sections })))
}

pub async fn rewrite_tone(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<AssistToneRequest>,
) -> Result<impl IntoResponse, ApiError> {
    metrics::counter!("foglio_assist_requests_total", "kind" => "tone").increment(1);
    let rewritten = state
        .assist
        .rewrite_tone(&user, &body.body_markdown, body.tone)
        .await?;
    Ok(Json(serde_json::json!({ "body_markdown": rewritten })))
}

pub async fn cover_prompt(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<AssistCoverRequest>,
) -> Result<impl IntoResponse, ApiError> {
    metrics::counter!("foglio_assist_requests_total", "kind" => "cover").increment(1);
    let prompt = state
        .assist
        .cover_prompt(&user, &body.title, &body.excerpt)
        .await?;
    Ok(Json(serde_json::json!({ "prompt": prompt })))
}
