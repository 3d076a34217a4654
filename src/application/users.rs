use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::audit::AuditService;
use crate::application::identity::IdentityEvent;
use crate::application::pagination::{CursorPage, PageRequest, TimeCursor};
use crate::application::repos::{
    RepoError, SettingsRepo, UpsertUserParams, UserQueryFilter, UsersRepo,
};
use crate::domain::entities::{SiteSettingsRecord, UserRecord};
use crate::domain::types::UserRole;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("user not found")]
    NotFound,
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    Invalid(&'static str),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UsersRepo>,
    settings: Arc<dyn SettingsRepo>,
    audit: AuditService,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        settings: Arc<dyn SettingsRepo>,
        audit: AuditService,
    ) -> Self {
        Self {
            users,
            settings,
            audit,
        }
    }

    /// Provision or refresh a profile from an identity-provider event.
    /// New accounts start as readers.
    pub async fn provision(&self, params: UpsertUserParams) -> Result<UserRecord, UserError> {
        if params.subject.trim().is_empty() {
            return Err(UserError::Invalid("subject is empty"));
        }
        if params.email.trim().is_empty() {
            return Err(UserError::Invalid("email is empty"));
        }
        let user = self.users.upsert_by_subject(params).await?;
        Ok(user)
    }

    pub async fn find_by_subject(&self, subject: &str) -> Result<Option<UserRecord>, UserError> {
        Ok(self.users.find_by_subject(subject).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<UserRecord, UserError> {
        self.users.find_by_id(id).await?.ok_or(UserError::NotFound)
    }

    pub async fn list(
        &self,
        admin: &UserRecord,
        filter: &UserQueryFilter,
        page: PageRequest<TimeCursor>,
    ) -> Result<CursorPage<UserRecord>, UserError> {
        require_admin(admin)?;
        Ok(self.users.list_users(filter, page).await?)
    }

    pub async fn set_role(
        &self,
        admin: &UserRecord,
        id: Uuid,
        role: UserRole,
    ) -> Result<UserRecord, UserError> {
        require_admin(admin)?;
        if admin.id == id {
            return Err(UserError::Invalid("admins cannot change their own role"));
        }
        let user = self.users.set_role(id, role).await?;
        self.audit
            .record(
                &format!("user:{}", admin.id),
                "user.role",
                "user",
                Some(&id.to_string()),
                Some(&serde_json::json!({ "role": role })),
            )
            .await?;
        Ok(user)
    }

    pub async fn set_suspended(
        &self,
        admin: &UserRecord,
        id: Uuid,
        suspended: bool,
    ) -> Result<UserRecord, UserError> {
        require_admin(admin)?;
        if admin.id == id {
            return Err(UserError::Invalid("admins cannot suspend themselves"));
        }
        let user = self.users.set_suspended(id, suspended).await?;
        let action = if suspended {
            "user.suspend"
        } else {
            "user.unsuspend"
        };
        self.audit
            .record(
                &format!("user:{}", admin.id),
                action,
                "user",
                Some(&id.to_string()),
                Option::<&()>::None,
            )
            .await?;
        Ok(user)
    }

    /// Apply an account event pushed by the identity provider's webhook.
    pub async fn apply_identity_event(&self, event: IdentityEvent) -> Result<(), UserError> {
        match event {
            IdentityEvent::UserUpserted {
                subject,
                email,
                display_name,
                avatar_url,
            } => {
                let user = self
                    .provision(UpsertUserParams {
                        subject,
                        email,
                        display_name,
                        avatar_url,
                    })
                    .await?;
                self.audit
                    .record(
                        "system",
                        "user.sync",
                        "user",
                        Some(&user.id.to_string()),
                        Option::<&()>::None,
                    )
                    .await?;
            }
            IdentityEvent::UserDeleted { subject } => {
                // Deletions for subjects never seen here are not an error.
                if let Some(user) = self.users.find_by_subject(&subject).await? {
                    self.users.set_suspended(user.id, true).await?;
                    self.audit
                        .record(
                            "system",
                            "user.deactivate",
                            "user",
                            Some(&user.id.to_string()),
                            Option::<&()>::None,
                        )
                        .await?;
                }
            }
        }
        Ok(())
    }

    pub async fn site_settings(&self) -> Result<SiteSettingsRecord, UserError> {
        Ok(self.settings.load_site_settings().await?)
    }

    pub async fn update_site_settings(
        &self,
        admin: &UserRecord,
        settings: SiteSettingsRecord,
    ) -> Result<(), UserError> {
        require_admin(admin)?;
        if settings.public_page_size < 1 || settings.admin_page_size < 1 {
            return Err(UserError::Invalid("page sizes must be positive"));
        }
        if settings.max_collaborators_per_post < 0 {
            return Err(UserError::Invalid("collaborator limit must be non-negative"));
        }
        self.settings.upsert_site_settings(settings.clone()).await?;
        self.audit
            .record(
                &format!("user:{}", admin.id),
                "settings.update",
                "settings",
                None,
                Some(&settings),
            )
            .await?;
        Ok(())
    }
}

fn require_admin(user: &UserRecord) -> Result<(), UserError> {
    if user.role.is_admin() {
        Ok(())
    } else {
        Err(UserError::Forbidden("admin role required"))
    }
}
