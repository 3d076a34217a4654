//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use time::OffsetDateTime;
use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::{
    CursorPage, JobCursor, PageRequest, PaginationError, PostCursor, QueueCursor, TimeCursor,
};
use crate::domain::entities::{
    AuditLogRecord, BookmarkRecord, CategoryRecord, CollaboratorGrantRecord, CommentRecord,
    JobRecord, MediaRecord, PostRecord, ReactionCount, SiteSettingsRecord, TagRecord, UserRecord,
};
use crate::domain::lifecycle::StatusChange;
use crate::domain::types::{
    CollaboratorPermission, CommentStatus, JobState, JobType, PostStatus, ReactionKind, UserRole,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error(transparent)]
    Pagination(#[from] PaginationError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Which listing of posts a query serves. The public scope is always pinned
/// to published posts; the author scope is restricted to posts the user can
/// see; admins see everything.
#[derive(Debug, Clone, Copy)]
pub enum PostListScope {
    Public,
    Author {
        user_id: Uuid,
        status: Option<PostStatus>,
    },
    Admin {
        status: Option<PostStatus>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct PostQueryFilter {
    pub tag: Option<String>,
    pub category: Option<String>,
    pub author: Option<Uuid>,
    pub search: Option<String>,
    pub featured: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub author_id: Uuid,
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub body_markdown: String,
    pub body_html: String,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub body_markdown: String,
    pub body_html: String,
    pub category_id: Option<Uuid>,
    pub featured: bool,
}

/// Persist the outcome of a lifecycle transition. Every editorial field is
/// written; the lifecycle table has already decided their values.
#[derive(Debug, Clone)]
pub struct UpdatePostStatusParams {
    pub id: Uuid,
    pub change: StatusChange,
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn list_posts(
        &self,
        scope: PostListScope,
        filter: &PostQueryFilter,
        page: PageRequest<PostCursor>,
    ) -> Result<CursorPage<PostRecord>, RepoError>;

    async fn count_posts(
        &self,
        scope: PostListScope,
        filter: &PostQueryFilter,
    ) -> Result<u64, RepoError>;

    /// Submitted and under-review posts, oldest submission first.
    async fn list_moderation_queue(
        &self,
        page: PageRequest<QueueCursor>,
    ) -> Result<CursorPage<PostRecord>, RepoError>;

    /// Scheduled posts whose publication time is due.
    async fn list_due_scheduled(
        &self,
        now: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<PostRecord>, RepoError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError>;

    async fn update_post_status(
        &self,
        params: UpdatePostStatusParams,
    ) -> Result<PostRecord, RepoError>;

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError>;

    async fn replace_post_tags(&self, post_id: Uuid, tag_ids: &[Uuid]) -> Result<(), RepoError>;
}

#[async_trait]
pub trait CollaboratorsRepo: Send + Sync {
    async fn list_for_post(
        &self,
        post_id: Uuid,
    ) -> Result<Vec<CollaboratorGrantRecord>, RepoError>;

    async fn list_for_user_on_post(
        &self,
        post_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<CollaboratorGrantRecord>, RepoError>;

    async fn grant(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        permission: CollaboratorPermission,
        granted_by: Uuid,
    ) -> Result<CollaboratorGrantRecord, RepoError>;

    async fn revoke(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        permission: CollaboratorPermission,
    ) -> Result<bool, RepoError>;

    async fn count_for_post(&self, post_id: Uuid) -> Result<u64, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub body_markdown: String,
    pub body_html: String,
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn create_comment(&self, params: CreateCommentParams) -> Result<CommentRecord, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError>;

    async fn list_for_post(
        &self,
        post_id: Uuid,
        include_hidden: bool,
        page: PageRequest<TimeCursor>,
    ) -> Result<CursorPage<CommentRecord>, RepoError>;

    async fn set_status(&self, id: Uuid, status: CommentStatus) -> Result<CommentRecord, RepoError>;
}

#[async_trait]
pub trait ReactionsRepo: Send + Sync {
    /// Toggle the reaction, returning `true` when it is now set.
    async fn toggle(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        kind: ReactionKind,
    ) -> Result<bool, RepoError>;

    async fn counts_for_post(&self, post_id: Uuid) -> Result<Vec<ReactionCount>, RepoError>;

    async fn kinds_for_user(
        &self,
        post_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<ReactionKind>, RepoError>;
}

#[async_trait]
pub trait BookmarksRepo: Send + Sync {
    async fn add(&self, user_id: Uuid, post_id: Uuid) -> Result<BookmarkRecord, RepoError>;

    async fn remove(&self, user_id: Uuid, post_id: Uuid) -> Result<bool, RepoError>;

    async fn list_for_user(
        &self,
        user_id: Uuid,
        page: PageRequest<TimeCursor>,
    ) -> Result<CursorPage<BookmarkRecord>, RepoError>;

    async fn exists(&self, user_id: Uuid, post_id: Uuid) -> Result<bool, RepoError>;
}

#[derive(Debug, Clone)]
pub struct UpsertTagParams {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub pinned: bool,
}

#[derive(Debug, Clone)]
pub struct UpsertCategoryParams {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
}

#[async_trait]
pub trait TaxonomyRepo: Send + Sync {
    async fn list_tags(&self) -> Result<Vec<TagRecord>, RepoError>;
    async fn tags_for_post(&self, post_id: Uuid) -> Result<Vec<TagRecord>, RepoError>;
    async fn find_tag_by_slug(&self, slug: &str) -> Result<Option<TagRecord>, RepoError>;
    async fn create_tag(&self, params: UpsertTagParams) -> Result<TagRecord, RepoError>;
    async fn update_tag(&self, id: Uuid, params: UpsertTagParams) -> Result<TagRecord, RepoError>;
    async fn delete_tag(&self, id: Uuid) -> Result<(), RepoError>;
    async fn tag_usage(&self, id: Uuid) -> Result<u64, RepoError>;

    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError>;
    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<CategoryRecord>, RepoError>;
    async fn find_category_by_id(&self, id: Uuid) -> Result<Option<CategoryRecord>, RepoError>;
    async fn create_category(
        &self,
        params: UpsertCategoryParams,
    ) -> Result<CategoryRecord, RepoError>;
    async fn update_category(
        &self,
        id: Uuid,
        params: UpsertCategoryParams,
    ) -> Result<CategoryRecord, RepoError>;
    async fn delete_category(&self, id: Uuid) -> Result<(), RepoError>;
    async fn category_usage(&self, id: Uuid) -> Result<u64, RepoError>;
}

#[derive(Debug, Clone)]
pub struct UpsertUserParams {
    pub subject: String,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UserQueryFilter {
    pub role: Option<UserRole>,
    pub suspended: Option<bool>,
    pub search: Option<String>,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    /// Create or refresh the local profile for an identity-provider subject.
    async fn upsert_by_subject(&self, params: UpsertUserParams) -> Result<UserRecord, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;

    async fn find_by_subject(&self, subject: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn list_users(
        &self,
        filter: &UserQueryFilter,
        page: PageRequest<TimeCursor>,
    ) -> Result<CursorPage<UserRecord>, RepoError>;

    async fn set_role(&self, id: Uuid, role: UserRole) -> Result<UserRecord, RepoError>;

    async fn set_suspended(&self, id: Uuid, suspended: bool) -> Result<UserRecord, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateMediaParams {
    pub owner_id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub cdn_url: String,
    pub alt_text: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MediaQueryFilter {
    pub owner: Option<Uuid>,
    pub content_type: Option<String>,
    pub search: Option<String>,
}

#[async_trait]
pub trait MediaRepo: Send + Sync {
    async fn insert_media(&self, params: CreateMediaParams) -> Result<MediaRecord, RepoError>;
    async fn find_media(&self, id: Uuid) -> Result<Option<MediaRecord>, RepoError>;
    async fn update_alt_text(
        &self,
        id: Uuid,
        alt_text: Option<String>,
    ) -> Result<MediaRecord, RepoError>;
    async fn list_media(
        &self,
        filter: &MediaQueryFilter,
        page: PageRequest<TimeCursor>,
    ) -> Result<CursorPage<MediaRecord>, RepoError>;
    async fn delete_media(&self, id: Uuid) -> Result<(), RepoError>;
}

#[derive(Debug, Clone, Default)]
pub struct AuditQueryFilter {
    pub actor: Option<String>,
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub search: Option<String>,
}

#[async_trait]
pub trait AuditRepo: Send + Sync {
    async fn append_log(&self, record: AuditLogRecord) -> Result<(), RepoError>;
    async fn list_recent(&self, limit: u32) -> Result<Vec<AuditLogRecord>, RepoError>;
    async fn list_filtered(
        &self,
        page: PageRequest<TimeCursor>,
        filter: &AuditQueryFilter,
    ) -> Result<CursorPage<AuditLogRecord>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct NewJobRecord {
    pub job_type: JobType,
    pub payload: serde_json::Value,
    pub run_at: OffsetDateTime,
    pub max_attempts: i32,
    pub priority: i32,
}

#[derive(Debug, Clone, Default)]
pub struct JobQueryFilter {
    pub state: Option<JobState>,
    pub job_type: Option<JobType>,
}

#[async_trait]
pub trait JobsRepo: Send + Sync {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError>;

    async fn cancel_jobs_for_post(&self, post_id: Uuid) -> Result<u64, RepoError>;

    async fn find_job(&self, id: &str) -> Result<Option<JobRecord>, RepoError>;

    async fn list_jobs(
        &self,
        filter: &JobQueryFilter,
        page: PageRequest<JobCursor>,
    ) -> Result<CursorPage<JobRecord>, RepoError>;
}

#[async_trait]
pub trait SettingsRepo: Send + Sync {
    async fn load_site_settings(&self) -> Result<SiteSettingsRecord, RepoError>;
    async fn upsert_site_settings(&self, settings: SiteSettingsRecord) -> Result<(), RepoError>;
}
