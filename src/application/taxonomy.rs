use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::audit::AuditService;
use crate::application::repos::{RepoError, TaxonomyRepo, UpsertCategoryParams, UpsertTagParams};
use crate::domain::entities::{CategoryRecord, TagRecord, UserRecord};
use crate::domain::slug::derive_slug;

#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("not found")]
    NotFound,
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    Invalid(&'static str),
    #[error("still referenced by {count} posts")]
    InUse { count: u64 },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct UpsertTagCommand {
    pub name: String,
    pub description: Option<String>,
    pub pinned: bool,
}

#[derive(Debug, Clone)]
pub struct UpsertCategoryCommand {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct TaxonomyService {
    repo: Arc<dyn TaxonomyRepo>,
    audit: AuditService,
}

impl TaxonomyService {
    pub fn new(repo: Arc<dyn TaxonomyRepo>, audit: AuditService) -> Self {
        Self { repo, audit }
    }

    pub async fn list_tags(&self) -> Result<Vec<TagRecord>, TaxonomyError> {
        Ok(self.repo.list_tags().await?)
    }

    pub async fn list_categories(&self) -> Result<Vec<CategoryRecord>, TaxonomyError> {
        Ok(self.repo.list_categories().await?)
    }

    pub async fn create_tag(
        &self,
        user: &UserRecord,
        command: UpsertTagCommand,
    ) -> Result<TagRecord, TaxonomyError> {
        require_admin(user, "tag management")?;
        let slug = derive_slug(&command.name).map_err(|_| TaxonomyError::Invalid("name"))?;

        let tag = self
            .repo
            .create_tag(UpsertTagParams {
                slug,
                name: command.name,
                description: command.description,
                pinned: command.pinned,
            })
            .await?;

        self.record(user, "tag.create", "tag", &tag.id, &tag).await?;
        Ok(tag)
    }

    pub async fn update_tag(
        &self,
        user: &UserRecord,
        id: Uuid,
        command: UpsertTagCommand,
    ) -> Result<TagRecord, TaxonomyError> {
        require_admin(user, "tag management")?;
        let slug = derive_slug(&command.name).map_err(|_| TaxonomyError::Invalid("name"))?;

        let tag = self
            .repo
            .update_tag(
                id,
                UpsertTagParams {
                    slug,
                    name: command.name,
                    description: command.description,
                    pinned: command.pinned,
                },
            )
            .await?;

        self.record(user, "tag.update", "tag", &tag.id, &tag).await?;
        Ok(tag)
    }

    pub async fn delete_tag(&self, user: &UserRecord, id: Uuid) -> Result<(), TaxonomyError> {
        require_admin(user, "tag management")?;
        let usage = self.repo.tag_usage(id).await?;
        if usage > 0 {
            return Err(TaxonomyError::InUse { count: usage });
        }
        self.repo.delete_tag(id).await?;
        self.record(user, "tag.delete", "tag", &id, &()).await?;
        Ok(())
    }

    pub async fn create_category(
        &self,
        user: &UserRecord,
        command: UpsertCategoryCommand,
    ) -> Result<CategoryRecord, TaxonomyError> {
        require_admin(user, "category management")?;
        let slug = derive_slug(&command.name).map_err(|_| TaxonomyError::Invalid("name"))?;

        let category = self
            .repo
            .create_category(UpsertCategoryParams {
                slug,
                name: command.name,
                description: command.description,
            })
            .await?;

        self.record(user, "category.create", "category", &category.id, &category)
            .await?;
        Ok(category)
    }

    pub async fn update_category(
        &self,
        user: &UserRecord,
        id: Uuid,
        command: UpsertCategoryCommand,
    ) -> Result<CategoryRecord, TaxonomyError> {
        require_admin(user, "category management")?;
        let slug = derive_slug(&command.name).map_err(|_| TaxonomyError::Invalid("name"))?;

        let category = self
            .repo
            .update_category(
                id,
                UpsertCategoryParams {
                    slug,
                    name: command.name,
                    description: command.description,
                },
            )
            .await?;

        self.record(user, "category.update", "category", &category.id, &category)
            .await?;
        Ok(category)
    }

    pub async fn delete_category(&self, user: &UserRecord, id: Uuid) -> Result<(), TaxonomyError> {
        require_admin(user, "category management")?;
        let usage = self.repo.category_usage(id).await?;
        if usage > 0 {
            return Err(TaxonomyError::InUse { count: usage });
        }
        self.repo.delete_category(id).await?;
        self.record(user, "category.delete", "category", &id, &())
            .await?;
        Ok(())
    }

    async fn record<S: serde::Serialize>(
        &self,
        user: &UserRecord,
        action: &str,
        entity_type: &str,
        entity_id: &Uuid,
        payload: &S,
    ) -> Result<(), RepoError> {
        self.audit
            .record(
                &format!("user:{}", user.id),
                action,
                entity_type,
                Some(&entity_id.to_string()),
                Some(payload),
            )
            .await
    }
}

fn require_admin(user: &UserRecord, what: &'static str) -> Result<(), TaxonomyError> {
    if user.role.is_admin() {
        Ok(())
    } else {
        Err(TaxonomyError::Forbidden(what))
    }
}
