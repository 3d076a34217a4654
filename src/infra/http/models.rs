use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::assist::ToneTarget;
use crate::application::bookmarks::BookmarkedPost;
use crate::application::pagination::CursorPage;
use crate::application::posts::PostDetail;
use crate::domain::entities::{
    PostRecord, ReactionCount, SiteSettingsRecord, TagRecord, UserRecord,
};
use crate::domain::lifecycle::LifecycleAction;
use crate::domain::types::{
    CollaboratorPermission, CommentStatus, PostStatus, ReactionKind, UserRole,
};

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn from_cursor_page<S>(page: CursorPage<S>, map: impl FnMut(S) -> T) -> Self {
        Self {
            items: page.items.into_iter().map(map).collect(),
            next_cursor: page.next_cursor,
        }
    }
}

/// Listing shape; bodies are omitted.
#[derive(Debug, Serialize)]
pub struct PostSummary {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub status: PostStatus,
    pub author_id: Uuid,
    pub category_id: Option<Uuid>,
    pub featured: bool,
    pub published_at: Option<OffsetDateTime>,
    pub updated_at: OffsetDateTime,
}

impl From<PostRecord> for PostSummary {
    fn from(post: PostRecord) -> Self {
        Self {
            id: post.id,
            slug: post.slug,
            title: post.title,
            excerpt: post.excerpt,
            status: post.status,
            author_id: post.author_id,
            category_id: post.category_id,
            featured: post.featured,
            published_at: post.published_at,
            updated_at: post.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    #[serde(flatten)]
    pub post: PostRecord,
    pub tags: Vec<TagRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<LifecycleAction>,
}

impl From<PostDetail> for PostResponse {
    fn from(detail: PostDetail) -> Self {
        Self {
            post: detail.post,
            tags: detail.tags,
            actions: detail.actions,
        }
    }
}

impl From<PostRecord> for PostResponse {
    fn from(post: PostRecord) -> Self {
        Self {
            post,
            tags: Vec::new(),
            actions: Vec::new(),
        }
    }
}

/// Profile shape safe to show to other signed-in users.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub role: UserRole,
    pub suspended: bool,
    pub created_at: OffsetDateTime,
}

impl From<UserRecord> for UserResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            role: user.role,
            suspended: user.suspended,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReactionsResponse {
    pub counts: Vec<ReactionCount>,
    pub mine: Vec<ReactionKind>,
}

#[derive(Debug, Serialize)]
pub struct BookmarkedPostResponse {
    pub bookmarked_at: OffsetDateTime,
    pub post: Option<PostSummary>,
}

impl From<BookmarkedPost> for BookmarkedPostResponse {
    fn from(entry: BookmarkedPost) -> Self {
        Self {
            bookmarked_at: entry.bookmark.created_at,
            post: entry.post.map(PostSummary::from),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub site_title: String,
    pub public_page_size: i32,
    pub admin_page_size: i32,
    pub comments_enabled: bool,
    pub max_collaborators_per_post: i32,
    pub timezone: String,
    pub updated_at: OffsetDateTime,
}

impl From<SiteSettingsRecord> for SettingsResponse {
    fn from(settings: SiteSettingsRecord) -> Self {
        Self {
            site_title: settings.site_title,
            public_page_size: settings.public_page_size,
            admin_page_size: settings.admin_page_size,
            comments_enabled: settings.comments_enabled,
            max_collaborators_per_post: settings.max_collaborators_per_post,
            timezone: settings.timezone.name().to_string(),
            updated_at: settings.updated_at,
        }
    }
}

// -------- Requests --------

#[derive(Debug, Deserialize)]
pub struct PostCreateRequest {
    pub title: String,
    pub excerpt: String,
    pub body_markdown: String,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct PostUpdateRequest {
    pub title: String,
    pub excerpt: String,
    pub body_markdown: String,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct LifecycleRequest {
    pub action: LifecycleAction,
    pub note: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub scheduled_for: Option<OffsetDateTime>,
}

#[derive(Debug, Deserialize)]
pub struct FeatureRequest {
    pub featured: bool,
}

#[derive(Debug, Deserialize)]
pub struct PostTagsRequest {
    pub tag_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub user_id: Uuid,
    pub permission: CollaboratorPermission,
}

#[derive(Debug, Deserialize)]
pub struct CommentCreateRequest {
    pub parent_id: Option<Uuid>,
    pub body_markdown: String,
}

#[derive(Debug, Deserialize)]
pub struct CommentStatusRequest {
    pub status: CommentStatus,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct SuspendRequest {
    pub suspended: bool,
}

#[derive(Debug, Deserialize)]
pub struct TagUpsertRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub pinned: bool,
}

#[derive(Debug, Deserialize)]
pub struct CategoryUpsertRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MediaRegisterRequest {
    pub filename: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub cdn_url: String,
    pub alt_text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AltTextRequest {
    pub alt_text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SettingsUpdateRequest {
    pub site_title: String,
    pub public_page_size: i32,
    pub admin_page_size: i32,
    pub comments_enabled: bool,
    pub max_collaborators_per_post: i32,
    pub timezone: String,
}

#[derive(Debug, Deserialize)]
pub struct AssistTitlesRequest {
    pub body_markdown: String,
}

#[derive(Debug, Deserialize)]
pub struct AssistOutlineRequest {
    pub topic: String,
}

#[derive(Debug, Deserialize)]
pub struct AssistToneRequest {
    pub body_markdown: String,
    pub tone: ToneTarget,
}

#[derive(Debug, Deserialize)]
pub struct AssistCoverRequest {
    pub title: String,
    pub excerpt: String,
}
