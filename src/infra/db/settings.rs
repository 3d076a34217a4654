use std::str::FromStr;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{RepoError, SettingsRepo};
use crate::domain::entities::SiteSettingsRecord;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct SettingsRow {
    site_title: String,
    public_page_size: i32,
    admin_page_size: i32,
    comments_enabled: bool,
    max_collaborators_per_post: i32,
    timezone: String,
    updated_at: OffsetDateTime,
}

impl TryFrom<SettingsRow> for SiteSettingsRecord {
    type Error = RepoError;

    fn try_from(row: SettingsRow) -> Result<Self, Self::Error> {
        let timezone = chrono_tz::Tz::from_str(&row.timezone).map_err(|_| RepoError::Integrity {
            message: format!("unknown timezone `{}` in site settings", row.timezone),
        })?;
        Ok(Self {
            site_title: row.site_title,
            public_page_size: row.public_page_size,
            admin_page_size: row.admin_page_size,
            comments_enabled: row.comments_enabled,
            max_collaborators_per_post: row.max_collaborators_per_post,
            timezone,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl SettingsRepo for PostgresRepositories {
    async fn load_site_settings(&self) -> Result<SiteSettingsRecord, RepoError> {
        let row = sqlx::query_as::<_, SettingsRow>(
            "SELECT site_title, public_page_size, admin_page_size, comments_enabled, \
             max_collaborators_per_post, timezone, updated_at \
             FROM site_settings WHERE singleton IS TRUE",
        )
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.try_into()
    }

    async fn upsert_site_settings(&self, settings: SiteSettingsRecord) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO site_settings \
             (singleton, site_title, public_page_size, admin_page_size, comments_enabled, \
              max_collaborators_per_post, timezone, updated_at) \
             VALUES (TRUE, $1, $2, $3, $4, $5, $6, now()) \
             ON CONFLICT (singleton) DO UPDATE SET \
               site_title = EXCLUDED.site_title, \
               public_page_size = EXCLUDED.public_page_size, \
               admin_page_size = EXCLUDED.admin_page_size, \
               comments_enabled = EXCLUDED.comments_enabled, \
               max_collaborators_per_post = EXCLUDED.max_collaborators_per_post, \
               timezone = EXCLUDED.timezone, \
               updated_at = now()",
        )
        .bind(settings.site_title)
        .bind(settings.public_page_size)
        .bind(settings.admin_page_size)
        .bind(settings.comments_enabled)
        .bind(settings.max_collaborators_per_post)
        .bind(settings.timezone.name())
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}
