use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use tracing::info;

use crate::application::identity::IdentityEvent;
use crate::infra::identity::verify_webhook_signature;

use super::super::error::ApiError;
use super::super::state::AppState;

const SIGNATURE_HEADER: &str = "x-foglio-signature";

/// Account sync pushed by the identity provider. The body is authenticated
/// by a shared-secret digest, not a bearer token.
pub async fn identity_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(ApiError::unauthorized)?;

    if !verify_webhook_signature(&state.webhook_secret, &body, signature) {
        return Err(ApiError::unauthorized());
    }

    let event: IdentityEvent = serde_json::from_slice(&body)
        .map_err(|err| ApiError::bad_request(format!("malformed event: {err}")))?;

    info!(target = "foglio::http::webhooks", event = ?event_kind(&event), "identity event received");
    state.users.apply_identity_event(event).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn event_kind(event: &IdentityEvent) -> &'static str {
    match event {
        IdentityEvent::UserUpserted { .. } => "user_upserted",
        IdentityEvent::UserDeleted { .. } => "user_deleted",
    }
}
