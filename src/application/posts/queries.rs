use uuid::Uuid;

use crate::application::pagination::{CursorPage, PageRequest, PostCursor};
use crate::application::repos::{PostListScope, PostQueryFilter};
use crate::domain::collaborators::{lifecycle_actor, resolve_access};
use crate::domain::entities::{PostRecord, TagRecord, UserRecord};
use crate::domain::lifecycle::{LifecycleAction, available_actions};

use super::service::PostService;
use super::types::PostError;

/// A post joined with its tags and the actions the viewer may take.
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostRecord,
    pub tags: Vec<TagRecord>,
    pub actions: Vec<LifecycleAction>,
}

impl PostService {
    pub async fn list_public(
        &self,
        filter: &PostQueryFilter,
        page: PageRequest<PostCursor>,
    ) -> Result<CursorPage<PostRecord>, PostError> {
        Ok(self
            .reader
            .list_posts(PostListScope::Public, filter, page)
            .await?)
    }

    pub async fn find_published_by_slug(&self, slug: &str) -> Result<PostDetail, PostError> {
        let post = self
            .reader
            .find_by_slug(slug)
            .await?
            .filter(|post| post.status.publicly_visible())
            .ok_or(PostError::NotFound)?;
        let tags = self.taxonomy.tags_for_post(post.id).await?;
        Ok(PostDetail {
            post,
            tags,
            actions: Vec::new(),
        })
    }

    /// Fetch a post for an authenticated viewer, enforcing visibility.
    pub async fn get_for_user(&self, user: &UserRecord, id: Uuid) -> Result<PostDetail, PostError> {
        let post = self.load(id).await?;
        let grants = self
            .collaborators
            .list_for_user_on_post(post.id, user.id)
            .await?;
        let access = resolve_access(&post, user, &grants);
        if !access.can_view {
            // A 404 here avoids leaking the existence of private drafts.
            return Err(PostError::NotFound);
        }

        let tags = self.taxonomy.tags_for_post(post.id).await?;
        let actor = lifecycle_actor(&post, user, &grants);
        let actions = available_actions(&post, &actor);
        Ok(PostDetail {
            post,
            tags,
            actions,
        })
    }

    /// Posts the user authored, any status.
    pub async fn list_for_author(
        &self,
        user: &UserRecord,
        filter: &PostQueryFilter,
        page: PageRequest<PostCursor>,
    ) -> Result<CursorPage<PostRecord>, PostError> {
        let scope = PostListScope::Author {
            user_id: user.id,
            status: None,
        };
        Ok(self.reader.list_posts(scope, filter, page).await?)
    }

    /// Administrative listing across every author and status.
    pub async fn list_admin(
        &self,
        user: &UserRecord,
        status: Option<crate::domain::types::PostStatus>,
        filter: &PostQueryFilter,
        page: PageRequest<PostCursor>,
    ) -> Result<CursorPage<PostRecord>, PostError> {
        if !user.role.is_admin() {
            return Err(PostError::Forbidden("admin listing requires admin role"));
        }
        Ok(self
            .reader
            .list_posts(PostListScope::Admin { status }, filter, page)
            .await?)
    }

    pub async fn count_admin(
        &self,
        user: &UserRecord,
        status: Option<crate::domain::types::PostStatus>,
        filter: &PostQueryFilter,
    ) -> Result<u64, PostError> {
        if !user.role.is_admin() {
            return Err(PostError::Forbidden("admin counts require admin role"));
        }
        Ok(self
            .reader
            .count_posts(PostListScope::Admin { status }, filter)
            .await?)
    }
}
