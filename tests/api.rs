mod support;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use time::macros::datetime;
use tower::ServiceExt;

use foglio::application::repos::{JobsRepo, UsersRepo};
use foglio::domain::types::{JobState, UserRole};
use support::{TestApp, WEBHOOK_SECRET, build_app};

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

async fn send(app: &TestApp, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(req).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

fn draft_body(title: &str) -> Value {
    json!({
        "title": title,
        "excerpt": "a short excerpt",
        "body_markdown": "# Hello\n\nSome *markdown* body.",
    })
}

async fn create_draft(app: &TestApp, token: &str, title: &str) -> Value {
    let (status, body) = send(
        app,
        request(Method::POST, "/api/v1/posts", Some(token), Some(draft_body(title))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

async fn lifecycle(
    app: &TestApp,
    token: &str,
    post_id: &str,
    body: Value,
) -> (StatusCode, Value) {
    send(
        app,
        request(
            Method::POST,
            &format!("/api/v1/posts/{post_id}/lifecycle"),
            Some(token),
            Some(body),
        ),
    )
    .await
}

#[tokio::test]
async fn healthz_reports_ok() {
    let app = build_app();
    let (status, _) = send(&app, request(Method::GET, "/healthz", None, None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn anonymous_post_creation_is_rejected() {
    let app = build_app();
    let (status, body) = send(
        &app,
        request(Method::POST, "/api/v1/posts", None, Some(draft_body("Nope"))),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn readers_cannot_create_posts() {
    let app = build_app();
    let (_, token) = app.login(UserRole::Reader);
    let (status, body) = send(
        &app,
        request(Method::POST, "/api/v1/posts", Some(&token), Some(draft_body("Nope"))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "forbidden");
}

#[tokio::test]
async fn drafts_stay_hidden_from_the_public_surface() {
    let app = build_app();
    let (_, token) = app.login(UserRole::Author);
    let created = create_draft(&app, &token, "Work In Progress").await;
    assert_eq!(created["status"], "draft");

    let (status, body) = send(&app, request(Method::GET, "/api/v1/posts", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().expect("items").len(), 0);

    let slug = created["slug"].as_str().expect("slug");
    let (status, _) = send(
        &app,
        request(Method::GET, &format!("/api/v1/posts/slug/{slug}"), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn full_editorial_flow_ends_in_public_visibility() {
    let app = build_app();
    let (_, author_token) = app.login(UserRole::Author);
    let (_, admin_token) = app.login(UserRole::Admin);
    let (_, reader_token) = app.login(UserRole::Reader);

    let created = create_draft(&app, &author_token, "Launch Notes").await;
    let post_id = created["id"].as_str().expect("id").to_string();
    let slug = created["slug"].as_str().expect("slug").to_string();

    let (status, body) =
        lifecycle(&app, &author_token, &post_id, json!({"action": "submit"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "submitted");

    let (status, body) =
        lifecycle(&app, &admin_token, &post_id, json!({"action": "claim_review"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "under_review");

    let (status, body) =
        lifecycle(&app, &admin_token, &post_id, json!({"action": "approve"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "approved");

    let (status, body) =
        lifecycle(&app, &admin_token, &post_id, json!({"action": "publish"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "published");
    assert!(!body["published_at"].is_null());

    let (status, body) = send(
        &app,
        request(Method::GET, &format!("/api/v1/posts/slug/{slug}"), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Launch Notes");

    // Readers can now react, bookmark, and comment.
    let (status, body) = send(
        &app,
        request(
            Method::PUT,
            &format!("/api/v1/posts/{post_id}/reactions/like"),
            Some(&reader_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], true);

    let (status, body) = send(
        &app,
        request(
            Method::PUT,
            &format!("/api/v1/posts/{post_id}/reactions/like"),
            Some(&reader_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], false);

    let (status, _) = send(
        &app,
        request(
            Method::PUT,
            &format!("/api/v1/posts/{post_id}/bookmark"),
            Some(&reader_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, comment) = send(
        &app,
        request(
            Method::POST,
            &format!("/api/v1/posts/{post_id}/comments"),
            Some(&reader_token),
            Some(json!({"body_markdown": "Great post!"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(comment["status"], "visible");

    let (status, body) = send(
        &app,
        request(
            Method::GET,
            &format!("/api/v1/posts/{post_id}/comments"),
            None,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().expect("items").len(), 1);
}

#[tokio::test]
async fn rejection_requires_a_note() {
    let app = build_app();
    let (_, author_token) = app.login(UserRole::Author);
    let (_, admin_token) = app.login(UserRole::Admin);

    let created = create_draft(&app, &author_token, "Needs Work").await;
    let post_id = created["id"].as_str().expect("id").to_string();
    lifecycle(&app, &author_token, &post_id, json!({"action": "submit"})).await;

    let (status, _) = lifecycle(&app, &admin_token, &post_id, json!({"action": "reject"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = lifecycle(
        &app,
        &admin_token,
        &post_id,
        json!({"action": "reject", "note": "Needs sources for section 2"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "rejected");
    assert_eq!(body["review_note"], "Needs sources for section 2");
}

#[tokio::test]
async fn publishing_a_draft_is_an_invalid_transition() {
    let app = build_app();
    let (_, author_token) = app.login(UserRole::Author);
    let (_, admin_token) = app.login(UserRole::Admin);

    let created = create_draft(&app, &author_token, "Too Eager").await;
    let post_id = created["id"].as_str().expect("id").to_string();

    let (status, body) = lifecycle(&app, &admin_token, &post_id, json!({"action": "publish"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "invalid_transition");
}

#[tokio::test]
async fn scheduling_queues_a_job_and_withdrawal_cancels_it() {
    let app = build_app();
    let (_, author_token) = app.login(UserRole::Author);
    let (_, admin_token) = app.login(UserRole::Admin);

    let created = create_draft(&app, &author_token, "Future Piece").await;
    let post_id = created["id"].as_str().expect("id").to_string();
    lifecycle(&app, &author_token, &post_id, json!({"action": "submit"})).await;
    lifecycle(&app, &admin_token, &post_id, json!({"action": "approve"})).await;

    let (status, body) = lifecycle(
        &app,
        &admin_token,
        &post_id,
        json!({"action": "schedule", "scheduled_for": "2030-01-01T00:00:00Z"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "scheduled");

    let jobs = app.store.jobs_snapshot();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].state, JobState::Pending);
    assert_eq!(jobs[0].run_at, datetime!(2030-01-01 0:00 UTC));

    let (status, body) =
        lifecycle(&app, &author_token, &post_id, json!({"action": "withdraw"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "approved");

    let jobs = app.store.jobs_snapshot();
    assert_eq!(jobs[0].state, JobState::Killed);
}

#[tokio::test]
async fn moderation_queue_lists_oldest_submission_first() {
    let app = build_app();
    let (_, author_token) = app.login(UserRole::Author);
    let (_, admin_token) = app.login(UserRole::Admin);

    let first = create_draft(&app, &author_token, "First In").await;
    let first_id = first["id"].as_str().expect("id").to_string();
    lifecycle(&app, &author_token, &first_id, json!({"action": "submit"})).await;

    // Distinct submission timestamps keep the ordering assertion meaningful.
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let second = create_draft(&app, &author_token, "Second In").await;
    let second_id = second["id"].as_str().expect("id").to_string();
    lifecycle(&app, &author_token, &second_id, json!({"action": "submit"})).await;

    let (status, body) = send(
        &app,
        request(Method::GET, "/api/v1/admin/queue", Some(&admin_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let items = body["items"].as_array().expect("items");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["title"], "First In");

    let (status, _) = send(
        &app,
        request(Method::GET, "/api/v1/admin/queue", Some(&author_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn disabling_comments_blocks_new_ones() {
    let app = build_app();
    let (_, author_token) = app.login(UserRole::Author);
    let (_, admin_token) = app.login(UserRole::Admin);
    let (_, reader_token) = app.login(UserRole::Reader);

    let created = create_draft(&app, &author_token, "Quiet Post").await;
    let post_id = created["id"].as_str().expect("id").to_string();
    lifecycle(&app, &author_token, &post_id, json!({"action": "submit"})).await;
    lifecycle(&app, &admin_token, &post_id, json!({"action": "approve"})).await;
    lifecycle(&app, &admin_token, &post_id, json!({"action": "publish"})).await;

    let (status, _) = send(
        &app,
        request(
            Method::PUT,
            "/api/v1/admin/settings",
            Some(&admin_token),
            Some(json!({
                "site_title": "Foglio",
                "public_page_size": 20,
                "admin_page_size": 50,
                "comments_enabled": false,
                "max_collaborators_per_post": 5,
                "timezone": "UTC",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            &format!("/api/v1/posts/{post_id}/comments"),
            Some(&reader_token),
            Some(json!({"body_markdown": "anyone home?"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "forbidden");
}

#[tokio::test]
async fn suspended_accounts_are_locked_out() {
    let app = build_app();
    let (user, token) = app.login(UserRole::Author);
    app.store
        .set_suspended(user.id, true)
        .await
        .expect("suspend");

    let (status, body) = send(
        &app,
        request(Method::GET, "/api/v1/me", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "account_suspended");
}

#[tokio::test]
async fn duplicate_tag_slugs_conflict() {
    let app = build_app();
    let (_, admin_token) = app.login(UserRole::Admin);
    let (_, reader_token) = app.login(UserRole::Reader);

    let (status, _) = send(
        &app,
        request(
            Method::POST,
            "/api/v1/admin/tags",
            Some(&reader_token),
            Some(json!({"name": "Rust"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, tag) = send(
        &app,
        request(
            Method::POST,
            "/api/v1/admin/tags",
            Some(&admin_token),
            Some(json!({"name": "Rust"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(tag["slug"], "rust");

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/api/v1/admin/tags",
            Some(&admin_token),
            Some(json!({"name": "Rust"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "duplicate");
}

fn webhook_signature(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(WEBHOOK_SECRET.as_bytes());
    hasher.update(b".");
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

#[tokio::test]
async fn identity_webhook_verifies_the_body_digest() {
    let app = build_app();
    let event = json!({
        "type": "user_upserted",
        "subject": "auth0|webhook-1",
        "email": "sync@example.com",
        "display_name": "Synced User",
    })
    .to_string();

    let forged = Request::builder()
        .method(Method::POST)
        .uri("/webhooks/identity")
        .header("x-foglio-signature", "0000")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(event.clone()))
        .expect("request");
    let (status, _) = send(&app, forged).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(
        app.store
            .find_by_subject("auth0|webhook-1")
            .await
            .expect("lookup")
            .is_none()
    );

    let signed = Request::builder()
        .method(Method::POST)
        .uri("/webhooks/identity")
        .header("x-foglio-signature", webhook_signature(&event))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(event))
        .expect("request");
    let (status, _) = send(&app, signed).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let synced = app
        .store
        .find_by_subject("auth0|webhook-1")
        .await
        .expect("lookup")
        .expect("synced user");
    assert_eq!(synced.email, "sync@example.com");
}

#[tokio::test]
async fn assist_endpoints_require_an_author() {
    let app = build_app();
    let (_, reader_token) = app.login(UserRole::Reader);
    let (_, author_token) = app.login(UserRole::Author);

    let (status, _) = send(
        &app,
        request(
            Method::POST,
            "/api/v1/assist/titles",
            Some(&reader_token),
            Some(json!({"body_markdown": "# Draft"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/api/v1/assist/titles",
            Some(&author_token),
            Some(json!({"body_markdown": "# Draft"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["titles"].as_array().expect("titles").len(), 2);

    // Every assist call leaves an audit trail.
    assert!(
        app.store
            .audit_actions()
            .iter()
            .any(|action| action == "assist.titles")
    );
}

// Cancellation marks the queued job rather than deleting it, so the admin
// job listing still shows it.
#[tokio::test]
async fn admin_job_listing_exposes_queue_state() {
    let app = build_app();
    let (_, author_token) = app.login(UserRole::Author);
    let (_, admin_token) = app.login(UserRole::Admin);

    let created = create_draft(&app, &author_token, "Queued Piece").await;
    let post_id = created["id"].as_str().expect("id").to_string();
    lifecycle(&app, &author_token, &post_id, json!({"action": "submit"})).await;
    lifecycle(&app, &admin_token, &post_id, json!({"action": "approve"})).await;
    lifecycle(
        &app,
        &admin_token,
        &post_id,
        json!({"action": "schedule", "scheduled_for": "2030-06-01T12:00:00Z"}),
    )
    .await;

    let job_id = app
        .store
        .jobs_snapshot()
        .first()
        .map(|job| job.id.clone())
        .expect("queued job");
    assert!(
        app.store
            .find_job(&job_id)
            .await
            .expect("lookup")
            .is_some()
    );

    let (status, body) = send(
        &app,
        request(Method::GET, "/api/v1/admin/jobs", Some(&admin_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().expect("items").len(), 1);

    let (status, body) = send(
        &app,
        request(
            Method::GET,
            &format!("/api/v1/admin/jobs/{job_id}"),
            Some(&admin_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["job_type"], "publish_post");
}
