pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod state;

pub use rate_limit::RateLimiter;
pub use state::AppState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, patch, post, put},
};

use middleware::{authenticate, log_responses, rate_limit, set_request_context};

/// Assemble the full HTTP surface. Admin-only operations are enforced in the
/// application services, so the router only distinguishes anonymous from
/// signed-in access.
pub fn build_router(state: AppState) -> Router {
    let auth_state = state.clone();
    let rate_state = state.clone();

    Router::new()
        .route("/healthz", get(handlers::health::healthz))
        .route("/webhooks/identity", post(handlers::webhooks::identity_webhook))
        // Public reading surface.
        .route(
            "/api/v1/posts",
            get(handlers::posts::list_public).post(handlers::posts::create_post),
        )
        .route("/api/v1/posts/slug/{slug}", get(handlers::posts::get_published))
        .route("/api/v1/tags", get(handlers::taxonomy::list_tags))
        .route("/api/v1/categories", get(handlers::taxonomy::list_categories))
        // Posts and their lifecycle.
        .route(
            "/api/v1/posts/{id}",
            get(handlers::posts::get_post)
                .patch(handlers::posts::update_post)
                .delete(handlers::posts::delete_post),
        )
        .route("/api/v1/posts/{id}/lifecycle", post(handlers::posts::apply_lifecycle))
        .route("/api/v1/posts/{id}/feature", post(handlers::posts::set_featured))
        .route("/api/v1/posts/{id}/tags", put(handlers::posts::replace_tags))
        // Collaborators.
        .route(
            "/api/v1/posts/{id}/collaborators",
            get(handlers::collaborators::list_collaborators)
                .post(handlers::collaborators::grant_collaborator),
        )
        .route(
            "/api/v1/posts/{id}/collaborators/{user_id}/{permission}",
            delete(handlers::collaborators::revoke_collaborator),
        )
        // Reader engagement.
        .route(
            "/api/v1/posts/{id}/comments",
            get(handlers::engagement::list_comments).post(handlers::engagement::create_comment),
        )
        .route(
            "/api/v1/comments/{id}",
            delete(handlers::engagement::delete_comment),
        )
        .route(
            "/api/v1/comments/{id}/status",
            post(handlers::engagement::set_comment_status),
        )
        .route(
            "/api/v1/posts/{id}/reactions",
            get(handlers::engagement::post_reactions),
        )
        .route(
            "/api/v1/posts/{id}/reactions/{kind}",
            put(handlers::engagement::toggle_reaction),
        )
        .route(
            "/api/v1/posts/{id}/bookmark",
            put(handlers::engagement::add_bookmark).delete(handlers::engagement::remove_bookmark),
        )
        // Signed-in user's own view.
        .route("/api/v1/me", get(handlers::users::me))
        .route("/api/v1/me/posts", get(handlers::posts::list_mine))
        .route("/api/v1/me/bookmarks", get(handlers::engagement::list_bookmarks))
        // Media library.
        .route(
            "/api/v1/media",
            get(handlers::media::list_media).post(handlers::media::register_media),
        )
        .route(
            "/api/v1/media/{id}",
            patch(handlers::media::update_alt_text).delete(handlers::media::delete_media),
        )
        // Content assistance.
        .route("/api/v1/assist/titles", post(handlers::assist::suggest_titles))
        .route("/api/v1/assist/outline", post(handlers::assist::outline))
        .route("/api/v1/assist/tone", post(handlers::assist::rewrite_tone))
        .route("/api/v1/assist/cover", post(handlers::assist::cover_prompt))
        // Moderation and administration.
        .route("/api/v1/admin/queue", get(handlers::posts::moderation_queue))
        .route("/api/v1/admin/queue/stats", get(handlers::posts::moderation_stats))
        .route("/api/v1/admin/posts", get(handlers::posts::list_admin))
        .route("/api/v1/admin/users", get(handlers::users::list_users))
        .route("/api/v1/admin/users/{id}/role", post(handlers::users::set_role))
        .route(
            "/api/v1/admin/users/{id}/suspend",
            post(handlers::users::set_suspended),
        )
        .route("/api/v1/admin/tags", post(handlers::taxonomy::create_tag))
        .route(
            "/api/v1/admin/tags/{id}",
            patch(handlers::taxonomy::update_tag).delete(handlers::taxonomy::delete_tag),
        )
        .route("/api/v1/admin/categories", post(handlers::taxonomy::create_category))
        .route(
            "/api/v1/admin/categories/{id}",
            patch(handlers::taxonomy::update_category).delete(handlers::taxonomy::delete_category),
        )
        .route(
            "/api/v1/admin/settings",
            get(handlers::users::get_settings).put(handlers::users::update_settings),
        )
        .route("/api/v1/admin/audit", get(handlers::admin::list_audit_logs))
        .route("/api/v1/admin/jobs", get(handlers::admin::list_jobs))
        .route("/api/v1/admin/jobs/{id}", get(handlers::admin::get_job))
        .layer(axum_middleware::from_fn_with_state(rate_state, rate_limit))
        .layer(axum_middleware::from_fn_with_state(auth_state, authenticate))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
        .with_state(state)
}
