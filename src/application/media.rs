use std::sync::Arc;

use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::application::audit::AuditService;
use crate::application::pagination::{CursorPage, PageRequest, TimeCursor};
use crate::application::repos::{CreateMediaParams, MediaQueryFilter, MediaRepo, RepoError};
use crate::domain::entities::{MediaRecord, UserRecord};

const MAX_MEDIA_BYTES: i64 = 64 * 1024 * 1024;

const ALLOWED_PREFIXES: &[&str] = &["image/", "video/", "audio/"];
const ALLOWED_EXACT: &[&str] = &["application/pdf"];

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media not found")]
    NotFound,
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    Invalid(&'static str),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Registration for an asset the client already uploaded to the CDN. The
/// bytes never pass through this service; only metadata is stored.
#[derive(Debug, Clone)]
pub struct RegisterMediaCommand {
    pub filename: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub cdn_url: String,
    pub alt_text: Option<String>,
}

#[derive(Clone)]
pub struct MediaService {
    repo: Arc<dyn MediaRepo>,
    audit: AuditService,
}

impl MediaService {
    pub fn new(repo: Arc<dyn MediaRepo>, audit: AuditService) -> Self {
        Self { repo, audit }
    }

    pub async fn register(
        &self,
        user: &UserRecord,
        command: RegisterMediaCommand,
    ) -> Result<MediaRecord, MediaError> {
        if !user.role.can_author() || user.suspended {
            return Err(MediaError::Forbidden("only authors may register media"));
        }
        if command.filename.trim().is_empty() {
            return Err(MediaError::Invalid("filename is empty"));
        }
        if command.size_bytes <= 0 || command.size_bytes > MAX_MEDIA_BYTES {
            return Err(MediaError::Invalid("size is out of range"));
        }

        let parsed = Url::parse(&command.cdn_url).map_err(|_| MediaError::Invalid("cdn_url"))?;
        if parsed.scheme() != "https" {
            return Err(MediaError::Invalid("cdn_url must be https"));
        }

        // Fall back to a guess from the filename when the client omits the
        // content type.
        let content_type = match command.content_type {
            Some(explicit) => explicit,
            None => mime_guess::from_path(&command.filename)
                .first_raw()
                .ok_or(MediaError::Invalid("content type could not be determined"))?
                .to_string(),
        };
        if !is_allowed_content_type(&content_type) {
            return Err(MediaError::Invalid("content type is not allowed"));
        }

        let record = self
            .repo
            .insert_media(CreateMediaParams {
                owner_id: user.id,
                filename: command.filename,
                content_type,
                size_bytes: command.size_bytes,
                cdn_url: command.cdn_url,
                alt_text: command.alt_text,
            })
            .await?;

        self.audit
            .record(
                &format!("user:{}", user.id),
                "media.register",
                "media",
                Some(&record.id.to_string()),
                Some(&record),
            )
            .await?;

        Ok(record)
    }

    pub async fn update_alt_text(
        &self,
        user: &UserRecord,
        id: Uuid,
        alt_text: Option<String>,
    ) -> Result<MediaRecord, MediaError> {
        let media = self.repo.find_media(id).await?.ok_or(MediaError::NotFound)?;
        if !(user.role.is_admin() || media.owner_id == user.id) {
            return Err(MediaError::Forbidden("not the owner of this media"));
        }
        Ok(self.repo.update_alt_text(id, alt_text).await?)
    }

    pub async fn list(
        &self,
        user: &UserRecord,
        mut filter: MediaQueryFilter,
        page: PageRequest<TimeCursor>,
    ) -> Result<CursorPage<MediaRecord>, MediaError> {
        // Non-admins only ever see their own library.
        if !user.role.is_admin() {
            filter.owner = Some(user.id);
        }
        Ok(self.repo.list_media(&filter, page).await?)
    }

    pub async fn delete(&self, user: &UserRecord, id: Uuid) -> Result<(), MediaError> {
        let media = self.repo.find_media(id).await?.ok_or(MediaError::NotFound)?;
        if !(user.role.is_admin() || media.owner_id == user.id) {
            return Err(MediaError::Forbidden("not the owner of this media"));
        }
        self.repo.delete_media(id).await?;
        self.audit
            .record(
                &format!("user:{}", user.id),
                "media.delete",
                "media",
                Some(&id.to_string()),
                Some(&serde_json::json!({ "cdn_url": media.cdn_url })),
            )
            .await?;
        Ok(())
    }
}

fn is_allowed_content_type(content_type: &str) -> bool {
    ALLOWED_PREFIXES
        .iter()
        .any(|prefix| content_type.starts_with(prefix))
        || ALLOWED_EXACT.contains(&content_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_allow_list() {
        assert!(is_allowed_content_type("image/png"));
        assert!(is_allowed_content_type("application/pdf"));
        assert!(!is_allowed_content_type("application/x-executable"));
        assert!(!is_allowed_content_type("text/html"));
    }
}
