use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::audit::AuditService;
use crate::application::pagination::{CursorPage, PageRequest, TimeCursor};
use crate::application::render::RenderService;
use crate::application::repos::{
    CommentsRepo, CreateCommentParams, PostsRepo, RepoError, SettingsRepo,
};
use crate::domain::entities::{CommentRecord, UserRecord};
use crate::domain::types::CommentStatus;

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("post not found")]
    PostNotFound,
    #[error("comment not found")]
    NotFound,
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    Invalid(&'static str),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

const MAX_COMMENT_LENGTH: usize = 10_000;

#[derive(Clone)]
pub struct CommentService {
    posts: Arc<dyn PostsRepo>,
    comments: Arc<dyn CommentsRepo>,
    settings: Arc<dyn SettingsRepo>,
    renderer: RenderService,
    audit: AuditService,
}

impl CommentService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        comments: Arc<dyn CommentsRepo>,
        settings: Arc<dyn SettingsRepo>,
        renderer: RenderService,
        audit: AuditService,
    ) -> Self {
        Self {
            posts,
            comments,
            settings,
            renderer,
            audit,
        }
    }

    pub async fn create(
        &self,
        user: &UserRecord,
        post_id: Uuid,
        parent_id: Option<Uuid>,
        body_markdown: String,
    ) -> Result<CommentRecord, CommentError> {
        if user.suspended {
            return Err(CommentError::Forbidden(
                "suspended accounts cannot comment",
            ));
        }
        let body = body_markdown.trim();
        if body.is_empty() {
            return Err(CommentError::Invalid("comment body is empty"));
        }
        if body.len() > MAX_COMMENT_LENGTH {
            return Err(CommentError::Invalid("comment body is too long"));
        }

        let settings = self.settings.load_site_settings().await?;
        if !settings.comments_enabled {
            return Err(CommentError::Forbidden("comments are disabled site-wide"));
        }

        let post = self
            .posts
            .find_by_id(post_id)
            .await?
            .filter(|post| post.status.publicly_visible())
            .ok_or(CommentError::PostNotFound)?;

        if let Some(parent) = parent_id {
            let parent = self
                .comments
                .find_by_id(parent)
                .await?
                .ok_or(CommentError::Invalid("parent comment does not exist"))?;
            if parent.post_id != post.id {
                return Err(CommentError::Invalid("parent belongs to another post"));
            }
            // One level of nesting only.
            if parent.parent_id.is_some() {
                return Err(CommentError::Invalid("replies cannot be nested further"));
            }
        }

        let body_html = self.renderer.render_comment(body);
        let record = self
            .comments
            .create_comment(CreateCommentParams {
                post_id: post.id,
                author_id: user.id,
                parent_id,
                body_markdown: body.to_string(),
                body_html,
            })
            .await?;

        Ok(record)
    }

    pub async fn list_for_post(
        &self,
        post_id: Uuid,
        viewer_is_admin: bool,
        page: PageRequest<TimeCursor>,
    ) -> Result<CursorPage<CommentRecord>, CommentError> {
        let post = self
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or(CommentError::PostNotFound)?;
        if !post.status.publicly_visible() && !viewer_is_admin {
            return Err(CommentError::PostNotFound);
        }
        Ok(self
            .comments
            .list_for_post(post.id, viewer_is_admin, page)
            .await?)
    }

    /// Authors soft-delete their own comments; the row stays for thread shape.
    pub async fn delete_own(&self, user: &UserRecord, id: Uuid) -> Result<(), CommentError> {
        let comment = self
            .comments
            .find_by_id(id)
            .await?
            .ok_or(CommentError::NotFound)?;
        if comment.author_id != user.id {
            return Err(CommentError::Forbidden("not your comment"));
        }
        self.comments.set_status(id, CommentStatus::Deleted).await?;
        Ok(())
    }

    /// Admin moderation: hide, restore, or delete any comment.
    pub async fn set_status(
        &self,
        user: &UserRecord,
        id: Uuid,
        status: CommentStatus,
    ) -> Result<CommentRecord, CommentError> {
        if !user.role.is_admin() {
            return Err(CommentError::Forbidden(
                "comment moderation requires admin role",
            ));
        }
        let updated = self.comments.set_status(id, status).await?;
        self.audit
            .record(
                &format!("user:{}", user.id),
                &format!("comment.{}", status.as_str()),
                "comment",
                Some(&id.to_string()),
                Option::<&()>::None,
            )
            .await?;
        Ok(updated)
    }
}
