use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::{PostsRepo, ReactionsRepo, RepoError};
use crate::domain::entities::{ReactionCount, UserRecord};
use crate::domain::types::ReactionKind;

#[derive(Debug, Error)]
pub enum ReactionError {
    #[error("post not found")]
    PostNotFound,
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct ReactionService {
    posts: Arc<dyn PostsRepo>,
    reactions: Arc<dyn ReactionsRepo>,
}

impl ReactionService {
    pub fn new(posts: Arc<dyn PostsRepo>, reactions: Arc<dyn ReactionsRepo>) -> Self {
        Self { posts, reactions }
    }

    /// Toggle a reaction. Returns `true` when the reaction is now set.
    pub async fn toggle(
        &self,
        user: &UserRecord,
        post_id: Uuid,
        kind: ReactionKind,
    ) -> Result<bool, ReactionError> {
        if user.suspended {
            return Err(ReactionError::Forbidden(
                "suspended accounts cannot react",
            ));
        }
        let post = self
            .posts
            .find_by_id(post_id)
            .await?
            .filter(|post| post.status.publicly_visible())
            .ok_or(ReactionError::PostNotFound)?;

        Ok(self.reactions.toggle(post.id, user.id, kind).await?)
    }

    pub async fn counts(&self, post_id: Uuid) -> Result<Vec<ReactionCount>, ReactionError> {
        let post = self
            .posts
            .find_by_id(post_id)
            .await?
            .filter(|post| post.status.publicly_visible())
            .ok_or(ReactionError::PostNotFound)?;
        Ok(self.reactions.counts_for_post(post.id).await?)
    }

    pub async fn mine(
        &self,
        user: &UserRecord,
        post_id: Uuid,
    ) -> Result<Vec<ReactionKind>, ReactionError> {
        Ok(self.reactions.kinds_for_user(post_id, user.id).await?)
    }
}
