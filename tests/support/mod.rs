//! In-memory repositories and fixtures shared by the integration tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use time::OffsetDateTime;
use uuid::Uuid;

use foglio::application::assist::{AssistError, AssistProvider, AssistService, ToneTarget};
use foglio::application::audit::AuditService;
use foglio::application::bookmarks::BookmarkService;
use foglio::application::collaborators::CollaboratorService;
use foglio::application::comments::CommentService;
use foglio::application::identity::{IdentityClaims, IdentityError, IdentityService, TokenVerifier};
use foglio::application::media::MediaService;
use foglio::application::moderation::ModerationService;
use foglio::application::pagination::{
    CursorPage, JobCursor, PageRequest, PostCursor, QueueCursor, TimeCursor,
};
use foglio::application::posts::PostService;
use foglio::application::reactions::ReactionService;
use foglio::application::render::RenderService;
use foglio::application::repos::{
    AuditQueryFilter, AuditRepo, BookmarksRepo, CollaboratorsRepo, CommentsRepo,
    CreateCommentParams, CreateMediaParams, CreatePostParams, JobQueryFilter, JobsRepo,
    MediaQueryFilter, MediaRepo, NewJobRecord, PostListScope, PostQueryFilter, PostsRepo,
    PostsWriteRepo, ReactionsRepo, RepoError, SettingsRepo, TaxonomyRepo, UpdatePostParams,
    UpdatePostStatusParams, UpsertCategoryParams, UpsertTagParams, UpsertUserParams,
    UserQueryFilter, UsersRepo,
};
use foglio::application::taxonomy::TaxonomyService;
use foglio::application::users::UserService;
use foglio::domain::entities::{
    AuditLogRecord, BookmarkRecord, CategoryRecord, CollaboratorGrantRecord, CommentRecord,
    JobRecord, MediaRecord, PostRecord, ReactionCount, SiteSettingsRecord, TagRecord, UserRecord,
};
use foglio::domain::types::{
    CollaboratorPermission, CommentStatus, JobState, JobType, PostStatus, ReactionKind, UserRole,
};
use foglio::infra::http::{AppState, RateLimiter, build_router};

pub const WEBHOOK_SECRET: &str = "whsec_test";

fn default_settings() -> SiteSettingsRecord {
    SiteSettingsRecord {
        site_title: "Foglio".to_string(),
        public_page_size: 20,
        admin_page_size: 50,
        comments_enabled: true,
        max_collaborators_per_post: 5,
        timezone: chrono_tz::Tz::UTC,
        updated_at: OffsetDateTime::now_utc(),
    }
}

fn cap<T>(mut items: Vec<T>, limit: u32) -> CursorPage<T> {
    items.truncate(limit.max(1) as usize);
    CursorPage {
        items,
        next_cursor: None,
    }
}

pub struct InMemoryStore {
    posts: Mutex<HashMap<Uuid, PostRecord>>,
    post_tags: Mutex<HashMap<Uuid, Vec<Uuid>>>,
    grants: Mutex<Vec<CollaboratorGrantRecord>>,
    comments: Mutex<HashMap<Uuid, CommentRecord>>,
    reactions: Mutex<Vec<(Uuid, Uuid, ReactionKind)>>,
    bookmarks: Mutex<Vec<BookmarkRecord>>,
    tags: Mutex<HashMap<Uuid, TagRecord>>,
    categories: Mutex<HashMap<Uuid, CategoryRecord>>,
    users: Mutex<HashMap<Uuid, UserRecord>>,
    media: Mutex<HashMap<Uuid, MediaRecord>>,
    audit: Mutex<Vec<AuditLogRecord>>,
    jobs: Mutex<HashMap<String, JobRecord>>,
    settings: Mutex<SiteSettingsRecord>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            posts: Mutex::new(HashMap::new()),
            post_tags: Mutex::new(HashMap::new()),
            grants: Mutex::new(Vec::new()),
            comments: Mutex::new(HashMap::new()),
            reactions: Mutex::new(Vec::new()),
            bookmarks: Mutex::new(Vec::new()),
            tags: Mutex::new(HashMap::new()),
            categories: Mutex::new(HashMap::new()),
            users: Mutex::new(HashMap::new()),
            media: Mutex::new(HashMap::new()),
            audit: Mutex::new(Vec::new()),
            jobs: Mutex::new(HashMap::new()),
            settings: Mutex::new(default_settings()),
        }
    }

    pub fn insert_user(&self, role: UserRole) -> UserRecord {
        let now = OffsetDateTime::now_utc();
        let id = Uuid::new_v4();
        let user = UserRecord {
            id,
            subject: format!("auth0|{id}"),
            email: format!("{id}@example.com"),
            display_name: format!("user-{}", &id.to_string()[..8]),
            avatar_url: None,
            role,
            suspended: false,
            created_at: now,
            updated_at: now,
        };
        self.users.lock().unwrap().insert(id, user.clone());
        user
    }

    pub fn get_post(&self, id: Uuid) -> Option<PostRecord> {
        self.posts.lock().unwrap().get(&id).cloned()
    }

    pub fn audit_actions(&self) -> Vec<String> {
        self.audit
            .lock()
            .unwrap()
            .iter()
            .map(|entry| entry.action.clone())
            .collect()
    }

    pub fn jobs_snapshot(&self) -> Vec<JobRecord> {
        self.jobs.lock().unwrap().values().cloned().collect()
    }

    fn post_matches(&self, post: &PostRecord, scope: PostListScope, filter: &PostQueryFilter) -> bool {
        let in_scope = match scope {
            PostListScope::Public => post.status.publicly_visible(),
            PostListScope::Author { user_id, status } => {
                let collaborates = self
                    .grants
                    .lock()
                    .unwrap()
                    .iter()
                    .any(|g| g.post_id == post.id && g.user_id == user_id);
                (post.author_id == user_id || collaborates)
                    && status.is_none_or(|wanted| post.status == wanted)
            }
            PostListScope::Admin { status } => status.is_none_or(|wanted| post.status == wanted),
        };
        if !in_scope {
            return false;
        }

        if let Some(author) = filter.author {
            if post.author_id != author {
                return false;
            }
        }
        if let Some(featured) = filter.featured {
            if post.featured != featured {
                return false;
            }
        }
        if let Some(search) = filter.search.as_ref() {
            let needle = search.to_lowercase();
            if !post.title.to_lowercase().contains(&needle)
                && !post.slug.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        if let Some(tag_slug) = filter.tag.as_ref() {
            let tags = self.tags.lock().unwrap();
            let post_tags = self.post_tags.lock().unwrap();
            let attached = post_tags.get(&post.id).cloned().unwrap_or_default();
            if !attached
                .iter()
                .any(|id| tags.get(id).is_some_and(|t| &t.slug == tag_slug))
            {
                return false;
            }
        }
        if let Some(category_slug) = filter.category.as_ref() {
            let categories = self.categories.lock().unwrap();
            let matches = post
                .category_id
                .and_then(|id| categories.get(&id).map(|c| &c.slug == category_slug))
                .unwrap_or(false);
            if !matches {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl PostsRepo for InMemoryStore {
    async fn list_posts(
        &self,
        scope: PostListScope,
        filter: &PostQueryFilter,
        page: PageRequest<PostCursor>,
    ) -> Result<CursorPage<PostRecord>, RepoError> {
        let mut items: Vec<PostRecord> = {
            let posts = self.posts.lock().unwrap();
            posts.values().cloned().collect()
        };
        items.retain(|post| self.post_matches(post, scope, filter));
        match scope {
            PostListScope::Public => {
                items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
            }
            _ => items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
        }
        Ok(cap(items, page.limit))
    }

    async fn count_posts(
        &self,
        scope: PostListScope,
        filter: &PostQueryFilter,
    ) -> Result<u64, RepoError> {
        let items: Vec<PostRecord> = {
            let posts = self.posts.lock().unwrap();
            posts.values().cloned().collect()
        };
        Ok(items
            .iter()
            .filter(|post| self.post_matches(post, scope, filter))
            .count() as u64)
    }

    async fn list_moderation_queue(
        &self,
        page: PageRequest<QueueCursor>,
    ) -> Result<CursorPage<PostRecord>, RepoError> {
        let mut items: Vec<PostRecord> = self
            .posts
            .lock()
            .unwrap()
            .values()
            .filter(|post| post.status.in_moderation_queue())
            .cloned()
            .collect();
        items.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        Ok(cap(items, page.limit))
    }

    async fn list_due_scheduled(
        &self,
        now: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let mut items: Vec<PostRecord> = self
            .posts
            .lock()
            .unwrap()
            .values()
            .filter(|post| {
                post.status == PostStatus::Scheduled
                    && post.scheduled_for.is_some_and(|when| when <= now)
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| a.scheduled_for.cmp(&b.scheduled_for));
        items.truncate(limit as usize);
        Ok(items)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError> {
        Ok(self
            .posts
            .lock()
            .unwrap()
            .values()
            .find(|post| post.slug == slug)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.posts.lock().unwrap().get(&id).cloned())
    }
}

#[async_trait]
impl PostsWriteRepo for InMemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let post = PostRecord {
            id: Uuid::new_v4(),
            author_id: params.author_id,
            slug: params.slug,
            title: params.title,
            excerpt: params.excerpt,
            body_markdown: params.body_markdown,
            body_html: params.body_html,
            status: PostStatus::Draft,
            category_id: params.category_id,
            featured: false,
            review_note: None,
            submitted_at: None,
            reviewed_at: None,
            reviewed_by: None,
            scheduled_for: None,
            published_at: None,
            archived_at: None,
            created_at: now,
            updated_at: now,
        };
        self.posts.lock().unwrap().insert(post.id, post.clone());
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut posts = self.posts.lock().unwrap();
        let post = posts.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        post.slug = params.slug;
        post.title = params.title;
        post.excerpt = params.excerpt;
        post.body_markdown = params.body_markdown;
        post.body_html = params.body_html;
        post.category_id = params.category_id;
        post.featured = params.featured;
        post.updated_at = OffsetDateTime::now_utc();
        Ok(post.clone())
    }

    async fn update_post_status(
        &self,
        params: UpdatePostStatusParams,
    ) -> Result<PostRecord, RepoError> {
        let mut posts = self.posts.lock().unwrap();
        let post = posts.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        let change = params.change;
        post.status = change.status;
        post.submitted_at = change.submitted_at;
        post.reviewed_at = change.reviewed_at;
        post.reviewed_by = change.reviewed_by;
        post.review_note = change.review_note;
        post.scheduled_for = change.scheduled_for;
        post.published_at = change.published_at;
        post.archived_at = change.archived_at;
        post.updated_at = OffsetDateTime::now_utc();
        Ok(post.clone())
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        self.posts.lock().unwrap().remove(&id);
        self.post_tags.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn replace_post_tags(&self, post_id: Uuid, tag_ids: &[Uuid]) -> Result<(), RepoError> {
        self.post_tags
            .lock()
            .unwrap()
            .insert(post_id, tag_ids.to_vec());
        Ok(())
    }
}

#[async_trait]
impl CollaboratorsRepo for InMemoryStore {
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CollaboratorGrantRecord>, RepoError> {
        Ok(self
            .grants
            .lock()
            .unwrap()
            .iter()
            .filter(|g| g.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn list_for_user_on_post(
        &self,
        post_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<CollaboratorGrantRecord>, RepoError> {
        Ok(self
            .grants
            .lock()
            .unwrap()
            .iter()
            .filter(|g| g.post_id == post_id && g.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn grant(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        permission: CollaboratorPermission,
        granted_by: Uuid,
    ) -> Result<CollaboratorGrantRecord, RepoError> {
        let mut grants = self.grants.lock().unwrap();
        grants.retain(|g| !(g.post_id == post_id && g.user_id == user_id && g.permission == permission));
        let record = CollaboratorGrantRecord {
            post_id,
            user_id,
            permission,
            granted_by,
            created_at: OffsetDateTime::now_utc(),
        };
        grants.push(record.clone());
        Ok(record)
    }

    async fn revoke(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        permission: CollaboratorPermission,
    ) -> Result<bool, RepoError> {
        let mut grants = self.grants.lock().unwrap();
        let before = grants.len();
        grants.retain(|g| !(g.post_id == post_id && g.user_id == user_id && g.permission == permission));
        Ok(grants.len() < before)
    }

    async fn count_for_post(&self, post_id: Uuid) -> Result<u64, RepoError> {
        let grants = self.grants.lock().unwrap();
        let mut users: Vec<Uuid> = grants
            .iter()
            .filter(|g| g.post_id == post_id)
            .map(|g| g.user_id)
            .collect();
        users.sort();
        users.dedup();
        Ok(users.len() as u64)
    }
}

#[async_trait]
impl CommentsRepo for InMemoryStore {
    async fn create_comment(&self, params: CreateCommentParams) -> Result<CommentRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let comment = CommentRecord {
            id: Uuid::new_v4(),
            post_id: params.post_id,
            author_id: params.author_id,
            parent_id: params.parent_id,
            body_markdown: params.body_markdown,
            body_html: params.body_html,
            status: CommentStatus::Visible,
            created_at: now,
            updated_at: now,
        };
        self.comments
            .lock()
            .unwrap()
            .insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError> {
        Ok(self.comments.lock().unwrap().get(&id).cloned())
    }

    async fn list_for_post(
        &self,
        post_id: Uuid,
        include_hidden: bool,
        page: PageRequest<TimeCursor>,
    ) -> Result<CursorPage<CommentRecord>, RepoError> {
        let mut items: Vec<CommentRecord> = self
            .comments
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.post_id == post_id)
            .filter(|c| include_hidden || c.status == CommentStatus::Visible)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(cap(items, page.limit))
    }

    async fn set_status(&self, id: Uuid, status: CommentStatus) -> Result<CommentRecord, RepoError> {
        let mut comments = self.comments.lock().unwrap();
        let comment = comments.get_mut(&id).ok_or(RepoError::NotFound)?;
        comment.status = status;
        comment.updated_at = OffsetDateTime::now_utc();
        Ok(comment.clone())
    }
}

#[async_trait]
impl ReactionsRepo for InMemoryStore {
    async fn toggle(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        kind: ReactionKind,
    ) -> Result<bool, RepoError> {
        let mut reactions = self.reactions.lock().unwrap();
        let before = reactions.len();
        reactions.retain(|(p, u, k)| !(*p == post_id && *u == user_id && *k == kind));
        if reactions.len() < before {
            return Ok(false);
        }
        reactions.push((post_id, user_id, kind));
        Ok(true)
    }

    async fn counts_for_post(&self, post_id: Uuid) -> Result<Vec<ReactionCount>, RepoError> {
        let reactions = self.reactions.lock().unwrap();
        let mut counts: Vec<ReactionCount> = Vec::new();
        for kind in [ReactionKind::Like, ReactionKind::Clap, ReactionKind::Insight] {
            let count = reactions
                .iter()
                .filter(|(p, _, k)| *p == post_id && *k == kind)
                .count() as u64;
            if count > 0 {
                counts.push(ReactionCount { kind, count });
            }
        }
        Ok(counts)
    }

    async fn kinds_for_user(
        &self,
        post_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<ReactionKind>, RepoError> {
        Ok(self
            .reactions
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, u, _)| *p == post_id && *u == user_id)
            .map(|(_, _, k)| *k)
            .collect())
    }
}

#[async_trait]
impl BookmarksRepo for InMemoryStore {
    async fn add(&self, user_id: Uuid, post_id: Uuid) -> Result<BookmarkRecord, RepoError> {
        let mut bookmarks = self.bookmarks.lock().unwrap();
        if let Some(existing) = bookmarks
            .iter()
            .find(|b| b.user_id == user_id && b.post_id == post_id)
        {
            return Ok(existing.clone());
        }
        let record = BookmarkRecord {
            user_id,
            post_id,
            created_at: OffsetDateTime::now_utc(),
        };
        bookmarks.push(record.clone());
        Ok(record)
    }

    async fn remove(&self, user_id: Uuid, post_id: Uuid) -> Result<bool, RepoError> {
        let mut bookmarks = self.bookmarks.lock().unwrap();
        let before = bookmarks.len();
        bookmarks.retain(|b| !(b.user_id == user_id && b.post_id == post_id));
        Ok(bookmarks.len() < before)
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        page: PageRequest<TimeCursor>,
    ) -> Result<CursorPage<BookmarkRecord>, RepoError> {
        let mut items: Vec<BookmarkRecord> = self
            .bookmarks
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(cap(items, page.limit))
    }

    async fn exists(&self, user_id: Uuid, post_id: Uuid) -> Result<bool, RepoError> {
        Ok(self
            .bookmarks
            .lock()
            .unwrap()
            .iter()
            .any(|b| b.user_id == user_id && b.post_id == post_id))
    }
}

#[async_trait]
impl TaxonomyRepo for InMemoryStore {
    async fn list_tags(&self) -> Result<Vec<TagRecord>, RepoError> {
        let mut tags: Vec<TagRecord> = self.tags.lock().unwrap().values().cloned().collect();
        tags.sort_by(|a, b| b.pinned.cmp(&a.pinned).then(a.name.cmp(&b.name)));
        Ok(tags)
    }

    async fn tags_for_post(&self, post_id: Uuid) -> Result<Vec<TagRecord>, RepoError> {
        let tags = self.tags.lock().unwrap();
        let post_tags = self.post_tags.lock().unwrap();
        Ok(post_tags
            .get(&post_id)
            .map(|ids| ids.iter().filter_map(|id| tags.get(id).cloned()).collect())
            .unwrap_or_default())
    }

    async fn find_tag_by_slug(&self, slug: &str) -> Result<Option<TagRecord>, RepoError> {
        Ok(self
            .tags
            .lock()
            .unwrap()
            .values()
            .find(|t| t.slug == slug)
            .cloned())
    }

    async fn create_tag(&self, params: UpsertTagParams) -> Result<TagRecord, RepoError> {
        let mut tags = self.tags.lock().unwrap();
        if tags.values().any(|t| t.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "tags_slug_key".to_string(),
            });
        }
        let now = OffsetDateTime::now_utc();
        let tag = TagRecord {
            id: Uuid::new_v4(),
            slug: params.slug,
            name: params.name,
            description: params.description,
            pinned: params.pinned,
            created_at: now,
            updated_at: now,
        };
        tags.insert(tag.id, tag.clone());
        Ok(tag)
    }

    async fn update_tag(&self, id: Uuid, params: UpsertTagParams) -> Result<TagRecord, RepoError> {
        let mut tags = self.tags.lock().unwrap();
        let tag = tags.get_mut(&id).ok_or(RepoError::NotFound)?;
        tag.slug = params.slug;
        tag.name = params.name;
        tag.description = params.description;
        tag.pinned = params.pinned;
        tag.updated_at = OffsetDateTime::now_utc();
        Ok(tag.clone())
    }

    async fn delete_tag(&self, id: Uuid) -> Result<(), RepoError> {
        self.tags
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }

    async fn tag_usage(&self, id: Uuid) -> Result<u64, RepoError> {
        Ok(self
            .post_tags
            .lock()
            .unwrap()
            .values()
            .filter(|ids| ids.contains(&id))
            .count() as u64)
    }

    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError> {
        let mut categories: Vec<CategoryRecord> =
            self.categories.lock().unwrap().values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<CategoryRecord>, RepoError> {
        Ok(self
            .categories
            .lock()
            .unwrap()
            .values()
            .find(|c| c.slug == slug)
            .cloned())
    }

    async fn find_category_by_id(&self, id: Uuid) -> Result<Option<CategoryRecord>, RepoError> {
        Ok(self.categories.lock().unwrap().get(&id).cloned())
    }

    async fn create_category(
        &self,
        params: UpsertCategoryParams,
    ) -> Result<CategoryRecord, RepoError> {
        let mut categories = self.categories.lock().unwrap();
        if categories.values().any(|c| c.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "categories_slug_key".to_string(),
            });
        }
        let now = OffsetDateTime::now_utc();
        let category = CategoryRecord {
            id: Uuid::new_v4(),
            slug: params.slug,
            name: params.name,
            description: params.description,
            created_at: now,
            updated_at: now,
        };
        categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn update_category(
        &self,
        id: Uuid,
        params: UpsertCategoryParams,
    ) -> Result<CategoryRecord, RepoError> {
        let mut categories = self.categories.lock().unwrap();
        let category = categories.get_mut(&id).ok_or(RepoError::NotFound)?;
        category.slug = params.slug;
        category.name = params.name;
        category.description = params.description;
        category.updated_at = OffsetDateTime::now_utc();
        Ok(category.clone())
    }

    async fn delete_category(&self, id: Uuid) -> Result<(), RepoError> {
        self.categories
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }

    async fn category_usage(&self, id: Uuid) -> Result<u64, RepoError> {
        Ok(self
            .posts
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.category_id == Some(id))
            .count() as u64)
    }
}

#[async_trait]
impl UsersRepo for InMemoryStore {
    async fn upsert_by_subject(&self, params: UpsertUserParams) -> Result<UserRecord, RepoError> {
        let mut users = self.users.lock().unwrap();
        if let Some(existing) = users.values_mut().find(|u| u.subject == params.subject) {
            existing.email = params.email;
            existing.display_name = params.display_name;
            existing.avatar_url = params.avatar_url;
            existing.updated_at = OffsetDateTime::now_utc();
            return Ok(existing.clone());
        }
        let now = OffsetDateTime::now_utc();
        let user = UserRecord {
            id: Uuid::new_v4(),
            subject: params.subject,
            email: params.email,
            display_name: params.display_name,
            avatar_url: params.avatar_url,
            role: UserRole::Reader,
            suspended: false,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_subject(&self, subject: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.subject == subject)
            .cloned())
    }

    async fn list_users(
        &self,
        filter: &UserQueryFilter,
        page: PageRequest<TimeCursor>,
    ) -> Result<CursorPage<UserRecord>, RepoError> {
        let mut items: Vec<UserRecord> = self
            .users
            .lock()
            .unwrap()
            .values()
            .filter(|u| filter.role.is_none_or(|role| u.role == role))
            .filter(|u| filter.suspended.is_none_or(|s| u.suspended == s))
            .filter(|u| {
                filter.search.as_ref().is_none_or(|needle| {
                    let needle = needle.to_lowercase();
                    u.display_name.to_lowercase().contains(&needle)
                        || u.email.to_lowercase().contains(&needle)
                })
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(cap(items, page.limit))
    }

    async fn set_role(&self, id: Uuid, role: UserRole) -> Result<UserRecord, RepoError> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&id).ok_or(RepoError::NotFound)?;
        user.role = role;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(user.clone())
    }

    async fn set_suspended(&self, id: Uuid, suspended: bool) -> Result<UserRecord, RepoError> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&id).ok_or(RepoError::NotFound)?;
        user.suspended = suspended;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(user.clone())
    }
}

#[async_trait]
impl MediaRepo for InMemoryStore {
    async fn insert_media(&self, params: CreateMediaParams) -> Result<MediaRecord, RepoError> {
        let media = MediaRecord {
            id: Uuid::new_v4(),
            owner_id: params.owner_id,
            filename: params.filename,
            content_type: params.content_type,
            size_bytes: params.size_bytes,
            cdn_url: params.cdn_url,
            alt_text: params.alt_text,
            created_at: OffsetDateTime::now_utc(),
        };
        self.media.lock().unwrap().insert(media.id, media.clone());
        Ok(media)
    }

    async fn find_media(&self, id: Uuid) -> Result<Option<MediaRecord>, RepoError> {
        Ok(self.media.lock().unwrap().get(&id).cloned())
    }

    async fn update_alt_text(
        &self,
        id: Uuid,
        alt_text: Option<String>,
    ) -> Result<MediaRecord, RepoError> {
        let mut media = self.media.lock().unwrap();
        let record = media.get_mut(&id).ok_or(RepoError::NotFound)?;
        record.alt_text = alt_text;
        Ok(record.clone())
    }

    async fn list_media(
        &self,
        filter: &MediaQueryFilter,
        page: PageRequest<TimeCursor>,
    ) -> Result<CursorPage<MediaRecord>, RepoError> {
        let mut items: Vec<MediaRecord> = self
            .media
            .lock()
            .unwrap()
            .values()
            .filter(|m| filter.owner.is_none_or(|owner| m.owner_id == owner))
            .filter(|m| {
                filter
                    .content_type
                    .as_ref()
                    .is_none_or(|ct| &m.content_type == ct)
            })
            .filter(|m| {
                filter
                    .search
                    .as_ref()
                    .is_none_or(|needle| m.filename.contains(needle.as_str()))
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(cap(items, page.limit))
    }

    async fn delete_media(&self, id: Uuid) -> Result<(), RepoError> {
        self.media
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl AuditRepo for InMemoryStore {
    async fn append_log(&self, record: AuditLogRecord) -> Result<(), RepoError> {
        self.audit.lock().unwrap().push(record);
        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<AuditLogRecord>, RepoError> {
        let audit = self.audit.lock().unwrap();
        Ok(audit.iter().rev().take(limit as usize).cloned().collect())
    }

    async fn list_filtered(
        &self,
        page: PageRequest<TimeCursor>,
        filter: &AuditQueryFilter,
    ) -> Result<CursorPage<AuditLogRecord>, RepoError> {
        let mut items: Vec<AuditLogRecord> = self
            .audit
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| filter.actor.as_ref().is_none_or(|a| &entry.actor == a))
            .filter(|entry| filter.action.as_ref().is_none_or(|a| &entry.action == a))
            .filter(|entry| {
                filter
                    .entity_type
                    .as_ref()
                    .is_none_or(|t| &entry.entity_type == t)
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(cap(items, page.limit))
    }
}

#[async_trait]
impl JobsRepo for InMemoryStore {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError> {
        let id = Uuid::new_v4().to_string();
        let record = JobRecord {
            id: id.clone(),
            job_type: job.job_type,
            payload: job.payload,
            state: JobState::Pending,
            attempts: 0,
            max_attempts: job.max_attempts,
            run_at: job.run_at,
            done_at: None,
            last_error: None,
        };
        self.jobs.lock().unwrap().insert(id.clone(), record);
        Ok(id)
    }

    async fn cancel_jobs_for_post(&self, post_id: Uuid) -> Result<u64, RepoError> {
        let wanted = post_id.to_string();
        let mut jobs = self.jobs.lock().unwrap();
        let mut canceled = 0;
        for job in jobs.values_mut() {
            let matches_post = job
                .payload
                .get("post_id")
                .and_then(|v| v.as_str())
                .is_some_and(|v| v == wanted);
            if job.job_type == JobType::PublishPost
                && matches_post
                && matches!(job.state, JobState::Pending | JobState::Scheduled)
            {
                job.state = JobState::Killed;
                job.done_at = Some(OffsetDateTime::now_utc());
                canceled += 1;
            }
        }
        Ok(canceled)
    }

    async fn find_job(&self, id: &str) -> Result<Option<JobRecord>, RepoError> {
        Ok(self.jobs.lock().unwrap().get(id).cloned())
    }

    async fn list_jobs(
        &self,
        filter: &JobQueryFilter,
        page: PageRequest<JobCursor>,
    ) -> Result<CursorPage<JobRecord>, RepoError> {
        let mut items: Vec<JobRecord> = self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|job| filter.state.is_none_or(|s| job.state == s))
            .filter(|job| filter.job_type.is_none_or(|t| job.job_type == t))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.run_at.cmp(&a.run_at));
        Ok(cap(items, page.limit))
    }
}

#[async_trait]
impl SettingsRepo for InMemoryStore {
    async fn load_site_settings(&self) -> Result<SiteSettingsRecord, RepoError> {
        Ok(self.settings.lock().unwrap().clone())
    }

    async fn upsert_site_settings(&self, settings: SiteSettingsRecord) -> Result<(), RepoError> {
        *self.settings.lock().unwrap() = settings;
        Ok(())
    }
}

#[derive(Default)]
pub struct StaticTokenVerifier {
    tokens: Mutex<HashMap<String, IdentityClaims>>,
}

impl StaticTokenVerifier {
    pub fn register(&self, token: &str, claims: IdentityClaims) {
        self.tokens
            .lock()
            .unwrap()
            .insert(token.to_string(), claims);
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<IdentityClaims, IdentityError> {
        self.tokens
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or(IdentityError::InvalidToken)
    }
}

pub struct CannedAssistProvider;

#[async_trait]
impl AssistProvider for CannedAssistProvider {
    async fn suggest_titles(&self, _body_markdown: &str) -> Result<Vec<String>, AssistError> {
        Ok(vec!["First Title".to_string(), "Second Title".to_string()])
    }

    async fn outline(&self, _topic: &str) -> Result<Vec<String>, AssistError> {
        Ok(vec!["Introduction".to_string(), "Conclusion".to_string()])
    }

    async fn rewrite_tone(
        &self,
        body_markdown: &str,
        _tone: ToneTarget,
    ) -> Result<String, AssistError> {
        Ok(format!("rewritten: {body_markdown}"))
    }

    async fn cover_prompt(&self, title: &str, _excerpt: &str) -> Result<String, AssistError> {
        Ok(format!("cover art for {title}"))
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub verifier: Arc<StaticTokenVerifier>,
    pub posts: Arc<PostService>,
    pub users: Arc<UserService>,
}

impl TestApp {
    /// Seed a user and a bearer token that resolves to them.
    pub fn login(&self, role: UserRole) -> (UserRecord, String) {
        let user = self.store.insert_user(role);
        let token = format!("token-{}", user.id);
        self.verifier.register(
            &token,
            IdentityClaims {
                subject: user.subject.clone(),
                email: user.email.clone(),
                display_name: user.display_name.clone(),
                avatar_url: None,
            },
        );
        (user, token)
    }
}

pub fn build_app() -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let verifier = Arc::new(StaticTokenVerifier::default());

    let posts_repo: Arc<dyn PostsRepo> = store.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = store.clone();
    let collaborators_repo: Arc<dyn CollaboratorsRepo> = store.clone();
    let comments_repo: Arc<dyn CommentsRepo> = store.clone();
    let reactions_repo: Arc<dyn ReactionsRepo> = store.clone();
    let bookmarks_repo: Arc<dyn BookmarksRepo> = store.clone();
    let taxonomy_repo: Arc<dyn TaxonomyRepo> = store.clone();
    let users_repo: Arc<dyn UsersRepo> = store.clone();
    let media_repo: Arc<dyn MediaRepo> = store.clone();
    let audit_repo: Arc<dyn AuditRepo> = store.clone();
    let jobs_repo: Arc<dyn JobsRepo> = store.clone();
    let settings_repo: Arc<dyn SettingsRepo> = store.clone();

    let renderer = RenderService::new();
    let audit = AuditService::new(audit_repo);

    let posts = Arc::new(PostService::new(
        posts_repo.clone(),
        posts_write_repo,
        collaborators_repo.clone(),
        taxonomy_repo.clone(),
        jobs_repo.clone(),
        renderer.clone(),
        audit.clone(),
    ));
    let moderation = Arc::new(ModerationService::new(posts_repo.clone()));
    let collaborators = Arc::new(CollaboratorService::new(
        posts_repo.clone(),
        users_repo.clone(),
        collaborators_repo,
        settings_repo.clone(),
        audit.clone(),
    ));
    let comments = Arc::new(CommentService::new(
        posts_repo.clone(),
        comments_repo,
        settings_repo.clone(),
        renderer.clone(),
        audit.clone(),
    ));
    let reactions = Arc::new(ReactionService::new(posts_repo.clone(), reactions_repo));
    let bookmarks = Arc::new(BookmarkService::new(posts_repo.clone(), bookmarks_repo));
    let taxonomy = Arc::new(TaxonomyService::new(taxonomy_repo, audit.clone()));
    let users = Arc::new(UserService::new(
        users_repo.clone(),
        settings_repo,
        audit.clone(),
    ));
    let media = Arc::new(MediaService::new(media_repo, audit.clone()));
    let identity = Arc::new(IdentityService::new(verifier.clone(), users_repo));
    let assist = Arc::new(AssistService::new(
        Arc::new(CannedAssistProvider),
        audit.clone(),
    ));

    let state = AppState {
        identity,
        posts: posts.clone(),
        moderation,
        collaborators,
        comments,
        reactions,
        bookmarks,
        taxonomy,
        users: users.clone(),
        media,
        assist,
        audit,
        jobs: jobs_repo,
        rate_limiter: Arc::new(RateLimiter::new(
            std::time::Duration::from_secs(60),
            10_000,
        )),
        webhook_secret: WEBHOOK_SECRET.into(),
    };

    TestApp {
        router: build_router(state),
        store,
        verifier,
        posts,
        users,
    }
}
