use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::assist::AssistError;
use crate::application::bookmarks::BookmarkError;
use crate::application::collaborators::CollaboratorError;
use crate::application::comments::CommentError;
use crate::application::error::ErrorReport;
use crate::application::identity::IdentityError;
use crate::application::media::MediaError;
use crate::application::pagination::PaginationError;
use crate::application::posts::PostError;
use crate::application::reactions::ReactionError;
use crate::application::repos::RepoError;
use crate::application::taxonomy::TaxonomyError;
use crate::application::users::UserError;
use crate::domain::lifecycle::LifecycleError;

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const FORBIDDEN: &str = "forbidden";
    pub const NOT_FOUND: &str = "not_found";
    pub const RATE_LIMITED: &str = "rate_limited";
    pub const DUPLICATE: &str = "duplicate";
    pub const INVALID_CURSOR: &str = "invalid_cursor";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const INVALID_TRANSITION: &str = "invalid_transition";
    pub const INTEGRITY: &str = "integrity_error";
    pub const LIMIT_REACHED: &str = "limit_reached";
    pub const IN_USE: &str = "in_use";
    pub const SUSPENDED: &str = "account_suspended";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const UPSTREAM: &str = "upstream_error";
    pub const INTERNAL: &str = "internal_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "Authentication required",
        )
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, codes::FORBIDDEN, message)
    }

    pub fn rate_limited(retry_after: u64) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: codes::RATE_LIMITED.to_string(),
                message: format!("Rate limit exceeded, retry after {retry_after} seconds"),
            },
        };
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        if let Ok(value) = axum::http::HeaderValue::from_str(&retry_after.to_string()) {
            response
                .headers_mut()
                .insert(axum::http::header::RETRY_AFTER, value);
        }
        ErrorReport::from_message(
            "infra::http::rate_limit",
            StatusCode::TOO_MANY_REQUESTS,
            format!("rate_limited: retry_after={retry_after}"),
        )
        .attach(&mut response);
        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = ErrorReport::from_message(
            "infra::http::error",
            self.status,
            format!("{}: {}", self.code, self.message),
        );
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        report.attach(&mut response);
        response
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => Self::not_found("Resource not found"),
            RepoError::Duplicate { constraint } => Self::new(
                StatusCode::CONFLICT,
                codes::DUPLICATE,
                format!("A conflicting record already exists ({constraint})"),
            ),
            RepoError::Pagination(err) => Self::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_CURSOR,
                err.to_string(),
            ),
            RepoError::InvalidInput { message } => {
                Self::new(StatusCode::BAD_REQUEST, codes::INVALID_INPUT, message)
            }
            RepoError::Integrity { message } => {
                Self::new(StatusCode::CONFLICT, codes::INTEGRITY, message)
            }
            RepoError::Timeout => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::DB_TIMEOUT,
                "Storage timed out",
            ),
            RepoError::Persistence(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::INTERNAL,
                "Persistence error",
            ),
        }
    }
}

impl From<PaginationError> for ApiError {
    fn from(err: PaginationError) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_CURSOR,
            err.to_string(),
        )
    }
}

// Lifecycle refusals name only the action and status, so the message is safe
// to return verbatim.
impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match &err {
            LifecycleError::InvalidTransition { .. } => {
                Self::new(StatusCode::CONFLICT, codes::INVALID_TRANSITION, err.to_string())
            }
            LifecycleError::Forbidden { .. } => Self::forbidden(err.to_string()),
            LifecycleError::MissingSchedule
            | LifecycleError::ScheduleInPast
            | LifecycleError::MissingNote => Self::bad_request(err.to_string()),
        }
    }
}

impl From<PostError> for ApiError {
    fn from(err: PostError) -> Self {
        match err {
            PostError::ConstraintViolation(message) => Self::bad_request(message),
            PostError::Forbidden(message) => Self::forbidden(message),
            PostError::NotFound => Self::not_found("Post not found"),
            PostError::Lifecycle(err) => err.into(),
            PostError::Repo(err) => err.into(),
        }
    }
}

impl From<CollaboratorError> for ApiError {
    fn from(err: CollaboratorError) -> Self {
        match err {
            CollaboratorError::PostNotFound => Self::not_found("Post not found"),
            CollaboratorError::UserNotFound => Self::not_found("User not found"),
            CollaboratorError::Forbidden(message) => Self::forbidden(message),
            CollaboratorError::Invalid(message) => Self::bad_request(message),
            CollaboratorError::LimitReached { limit } => Self::new(
                StatusCode::CONFLICT,
                codes::LIMIT_REACHED,
                format!("Collaborator limit of {limit} reached"),
            ),
            CollaboratorError::Repo(err) => err.into(),
        }
    }
}

impl From<CommentError> for ApiError {
    fn from(err: CommentError) -> Self {
        match err {
            CommentError::PostNotFound => Self::not_found("Post not found"),
            CommentError::NotFound => Self::not_found("Comment not found"),
            CommentError::Forbidden(message) => Self::forbidden(message),
            CommentError::Invalid(message) => Self::bad_request(message),
            CommentError::Repo(err) => err.into(),
        }
    }
}

impl From<ReactionError> for ApiError {
    fn from(err: ReactionError) -> Self {
        match err {
            ReactionError::PostNotFound => Self::not_found("Post not found"),
            ReactionError::Forbidden(message) => Self::forbidden(message),
            ReactionError::Repo(err) => err.into(),
        }
    }
}

impl From<BookmarkError> for ApiError {
    fn from(err: BookmarkError) -> Self {
        match err {
            BookmarkError::PostNotFound => Self::not_found("Post not found"),
            BookmarkError::Repo(err) => err.into(),
        }
    }
}

impl From<TaxonomyError> for ApiError {
    fn from(err: TaxonomyError) -> Self {
        match err {
            TaxonomyError::NotFound => Self::not_found("Resource not found"),
            TaxonomyError::Forbidden(message) => Self::forbidden(message),
            TaxonomyError::Invalid(message) => Self::bad_request(message),
            TaxonomyError::InUse { count } => Self::new(
                StatusCode::CONFLICT,
                codes::IN_USE,
                format!("Still referenced by {count} posts"),
            ),
            TaxonomyError::Repo(err) => err.into(),
        }
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound => Self::not_found("User not found"),
            UserError::Forbidden(message) => Self::forbidden(message),
            UserError::Invalid(message) => Self::bad_request(message),
            UserError::Repo(err) => err.into(),
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::NotFound => Self::not_found("Media not found"),
            MediaError::Forbidden(message) => Self::forbidden(message),
            MediaError::Invalid(message) => Self::bad_request(message),
            MediaError::Repo(err) => err.into(),
        }
    }
}

impl From<AssistError> for ApiError {
    fn from(err: AssistError) -> Self {
        match err {
            AssistError::Forbidden(message) => Self::forbidden(message),
            AssistError::Invalid(message) => Self::bad_request(message),
            AssistError::Provider(_) => Self::new(
                StatusCode::BAD_GATEWAY,
                codes::UPSTREAM,
                "Content assistance is unavailable",
            ),
            AssistError::Repo(err) => err.into(),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidToken => Self::unauthorized(),
            IdentityError::Suspended => Self::new(
                StatusCode::FORBIDDEN,
                codes::SUSPENDED,
                "This account is suspended",
            ),
            IdentityError::ProviderUnavailable(_) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::UPSTREAM,
                "Identity provider is unavailable",
            ),
            IdentityError::Repo(err) => err.into(),
        }
    }
}
