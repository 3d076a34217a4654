use std::sync::Arc;

use crate::application::pagination::{CursorPage, PageRequest, QueueCursor};
use crate::application::posts::PostError;
use crate::application::repos::{PostListScope, PostQueryFilter, PostsRepo};
use crate::domain::entities::{PostRecord, UserRecord};
use crate::domain::types::PostStatus;

/// Admin-facing view over the moderation queue. Decisions themselves are
/// lifecycle actions and go through [`crate::application::posts::PostService`].
#[derive(Clone)]
pub struct ModerationService {
    posts: Arc<dyn PostsRepo>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct QueueStats {
    pub submitted: u64,
    pub under_review: u64,
}

impl ModerationService {
    pub fn new(posts: Arc<dyn PostsRepo>) -> Self {
        Self { posts }
    }

    /// Pending submissions, oldest first.
    pub async fn list_queue(
        &self,
        user: &UserRecord,
        page: PageRequest<QueueCursor>,
    ) -> Result<CursorPage<PostRecord>, PostError> {
        if !user.role.is_admin() {
            return Err(PostError::Forbidden("moderation queue requires admin role"));
        }
        Ok(self.posts.list_moderation_queue(page).await?)
    }

    pub async fn queue_stats(&self, user: &UserRecord) -> Result<QueueStats, PostError> {
        if !user.role.is_admin() {
            return Err(PostError::Forbidden("moderation stats require admin role"));
        }
        let filter = PostQueryFilter::default();
        let submitted = self
            .posts
            .count_posts(
                PostListScope::Admin {
                    status: Some(PostStatus::Submitted),
                },
                &filter,
            )
            .await?;
        let under_review = self
            .posts
            .count_posts(
                PostListScope::Admin {
                    status: Some(PostStatus::UnderReview),
                },
                &filter,
            )
            .await?;
        Ok(QueueStats {
            submitted,
            under_review,
        })
    }
}
