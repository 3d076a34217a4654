use async_trait::async_trait;
use sqlx::QueryBuilder;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{CursorPage, PageRequest, TimeCursor};
use crate::application::repos::{
    RepoError, UpsertUserParams, UserQueryFilter, UsersRepo,
};
use crate::domain::entities::UserRecord;
use crate::domain::types::UserRole;

use super::{PostgresRepositories, map_sqlx_error};

const USER_COLUMNS: &str =
    "id, subject, email, display_name, avatar_url, role, suspended, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    subject: String,
    email: String,
    display_name: String,
    avatar_url: Option<String>,
    role: UserRole,
    suspended: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            subject: row.subject,
            email: row.email,
            display_name: row.display_name,
            avatar_url: row.avatar_url,
            role: row.role,
            suspended: row.suspended,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl UsersRepo for PostgresRepositories {
    async fn upsert_by_subject(&self, params: UpsertUserParams) -> Result<UserRecord, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (id, subject, email, display_name, avatar_url, role, suspended, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, 'reader'::user_role, FALSE, now(), now()) \
             ON CONFLICT (subject) DO UPDATE SET \
               email = EXCLUDED.email, \
               display_name = EXCLUDED.display_name, \
               avatar_url = EXCLUDED.avatar_url, \
               updated_at = now() \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(params.subject)
        .bind(params.email)
        .bind(params.display_name)
        .bind(params.avatar_url)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(UserRecord::from))
    }

    async fn find_by_subject(&self, subject: &str) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE subject = $1"
        ))
        .bind(subject)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(UserRecord::from))
    }

    async fn list_users(
        &self,
        filter: &UserQueryFilter,
        page: PageRequest<TimeCursor>,
    ) -> Result<CursorPage<UserRecord>, RepoError> {
        let limit = page.limit.clamp(1, 200);
        let mut qb = QueryBuilder::new(format!(
            "SELECT {USER_COLUMNS} FROM users WHERE 1=1 "
        ));

        if let Some(role) = filter.role {
            qb.push(" AND role = ");
            qb.push_bind(role);
        }

        if let Some(suspended) = filter.suspended {
            qb.push(" AND suspended = ");
            qb.push_bind(suspended);
        }

        if let Some(search) = filter.search.as_ref() {
            let pattern = format!("%{}%", search);
            qb.push(" AND (email ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR display_name ILIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }

        if let Some(cursor) = page.cursor {
            qb.push(" AND (created_at < ");
            qb.push_bind(cursor.created_at);
            qb.push(" OR (created_at = ");
            qb.push_bind(cursor.created_at);
            qb.push(" AND id < ");
            qb.push_bind(cursor.id);
            qb.push("))");
        }

        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        qb.push_bind(limit as i64);

        let rows = qb
            .build_query_as::<UserRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let records: Vec<UserRecord> = rows.into_iter().map(UserRecord::from).collect();
        let next_cursor = if records.len() as u32 == limit {
            records
                .last()
                .map(|user| TimeCursor::new(user.created_at, user.id).encode())
        } else {
            None
        };

        Ok(CursorPage::new(records, next_cursor))
    }

    async fn set_role(&self, id: Uuid, role: UserRole) -> Result<UserRecord, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET role = $2, updated_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Ok(row.into())
    }

    async fn set_suspended(&self, id: Uuid, suspended: bool) -> Result<UserRecord, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET suspended = $2, updated_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(suspended)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Ok(row.into())
    }
}
