use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::audit::AuditService;
use crate::application::repos::{
    CollaboratorsRepo, PostsRepo, RepoError, SettingsRepo, UsersRepo,
};
use crate::domain::collaborators::validate_grant;
use crate::domain::entities::{CollaboratorGrantRecord, UserRecord};
use crate::domain::types::CollaboratorPermission;

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("post not found")]
    PostNotFound,
    #[error("user not found")]
    UserNotFound,
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    Invalid(&'static str),
    #[error("collaborator limit of {limit} reached")]
    LimitReached { limit: i32 },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct CollaboratorService {
    posts: Arc<dyn PostsRepo>,
    users: Arc<dyn UsersRepo>,
    grants: Arc<dyn CollaboratorsRepo>,
    settings: Arc<dyn SettingsRepo>,
    audit: AuditService,
}

impl CollaboratorService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        users: Arc<dyn UsersRepo>,
        grants: Arc<dyn CollaboratorsRepo>,
        settings: Arc<dyn SettingsRepo>,
        audit: AuditService,
    ) -> Self {
        Self {
            posts,
            users,
            grants,
            settings,
            audit,
        }
    }

    pub async fn list(
        &self,
        user: &UserRecord,
        post_id: Uuid,
    ) -> Result<Vec<CollaboratorGrantRecord>, CollaboratorError> {
        let post = self
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or(CollaboratorError::PostNotFound)?;
        if !(user.role.is_admin() || post.author_id == user.id) {
            return Err(CollaboratorError::Forbidden(
                "only the author may inspect collaborators",
            ));
        }
        Ok(self.grants.list_for_post(post_id).await?)
    }

    pub async fn grant(
        &self,
        user: &UserRecord,
        post_id: Uuid,
        grantee_id: Uuid,
        permission: CollaboratorPermission,
    ) -> Result<CollaboratorGrantRecord, CollaboratorError> {
        let post = self
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or(CollaboratorError::PostNotFound)?;
        if !(user.role.is_admin() || post.author_id == user.id) {
            return Err(CollaboratorError::Forbidden(
                "only the author may grant access",
            ));
        }

        let grantee = self
            .users
            .find_by_id(grantee_id)
            .await?
            .ok_or(CollaboratorError::UserNotFound)?;
        if grantee.suspended {
            return Err(CollaboratorError::Invalid(
                "suspended accounts cannot collaborate",
            ));
        }
        validate_grant(&post, grantee.id).map_err(CollaboratorError::Invalid)?;

        let limit = self
            .settings
            .load_site_settings()
            .await?
            .max_collaborators_per_post;
        let current = self.grants.count_for_post(post_id).await?;
        if current >= limit as u64 {
            return Err(CollaboratorError::LimitReached { limit });
        }

        let record = self
            .grants
            .grant(post_id, grantee.id, permission, user.id)
            .await?;

        self.audit
            .record(
                &format!("user:{}", user.id),
                "collaborator.grant",
                "post",
                Some(&post_id.to_string()),
                Some(&record),
            )
            .await?;

        Ok(record)
    }

    pub async fn revoke(
        &self,
        user: &UserRecord,
        post_id: Uuid,
        grantee_id: Uuid,
        permission: CollaboratorPermission,
    ) -> Result<(), CollaboratorError> {
        let post = self
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or(CollaboratorError::PostNotFound)?;
        if !(user.role.is_admin() || post.author_id == user.id) {
            return Err(CollaboratorError::Forbidden(
                "only the author may revoke access",
            ));
        }

        let removed = self.grants.revoke(post_id, grantee_id, permission).await?;
        if !removed {
            return Err(CollaboratorError::Invalid("no such grant"));
        }

        self.audit
            .record(
                &format!("user:{}", user.id),
                "collaborator.revoke",
                "post",
                Some(&post_id.to_string()),
                Some(&serde_json::json!({
                    "user_id": grantee_id,
                    "permission": permission,
                })),
            )
            .await?;

        Ok(())
    }
}
