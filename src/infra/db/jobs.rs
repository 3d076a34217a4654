use std::convert::TryFrom;

use async_trait::async_trait;
use sqlx::QueryBuilder;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::pagination::{CursorPage, JobCursor, PageRequest},
    application::repos::{JobQueryFilter, JobsRepo, NewJobRecord, RepoError},
    domain::{
        entities::JobRecord,
        types::{JobState, JobType},
    },
};

use super::{PostgresRepositories, map_sqlx_error};

const JOB_COLUMNS: &str =
    "id, job_type, job, status, attempts, max_attempts, run_at, done_at, last_error";

#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    job_type: String,
    job: serde_json::Value,
    status: String,
    attempts: i32,
    max_attempts: i32,
    run_at: OffsetDateTime,
    done_at: Option<OffsetDateTime>,
    last_error: Option<String>,
}

impl TryFrom<JobRow> for JobRecord {
    type Error = RepoError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let job_type = JobType::try_from(row.job_type.as_str()).map_err(|_| {
            RepoError::from_persistence(format!("unknown job type `{}`", row.job_type))
        })?;

        let state = JobState::try_from(row.status.as_str()).map_err(|_| {
            RepoError::from_persistence(format!("unknown job state `{}`", row.status))
        })?;

        Ok(Self {
            id: row.id,
            job_type,
            payload: row.job,
            state,
            attempts: row.attempts,
            max_attempts: row.max_attempts,
            run_at: row.run_at,
            done_at: row.done_at,
            last_error: row.last_error,
        })
    }
}

#[async_trait]
impl JobsRepo for PostgresRepositories {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError> {
        let id: String = sqlx::query_scalar(
            "SELECT (apalis.push_job($1, $2::json, $3, $4, $5, $6)).id",
        )
        .bind(job.job_type.as_str())
        .bind(job.payload)
        .bind("Pending")
        .bind(job.run_at)
        .bind(job.max_attempts)
        .bind(job.priority)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(id)
    }

    async fn cancel_jobs_for_post(&self, post_id: Uuid) -> Result<u64, RepoError> {
        let result = sqlx::query(
            "UPDATE apalis.jobs \
                SET status = 'Killed', done_at = now(), \
                    last_error = 'canceled: post left the scheduled state' \
              WHERE job_type = $1 \
                AND status IN ('Pending', 'Latest', 'Scheduled') \
                AND job->>'post_id' = $2",
        )
        .bind(JobType::PublishPost.as_str())
        .bind(post_id.to_string())
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn find_job(&self, id: &str) -> Result<Option<JobRecord>, RepoError> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM apalis.jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => JobRecord::try_from(row).map(Some),
            None => Ok(None),
        }
    }

    async fn list_jobs(
        &self,
        filter: &JobQueryFilter,
        page: PageRequest<JobCursor>,
    ) -> Result<CursorPage<JobRecord>, RepoError> {
        let limit = page.limit.clamp(1, 200);
        let mut qb = QueryBuilder::new(format!(
            "SELECT {JOB_COLUMNS} FROM apalis.jobs WHERE 1=1 "
        ));

        if let Some(state) = filter.state {
            qb.push(" AND status = ");
            qb.push_bind(state.as_str());
        }

        if let Some(job_type) = filter.job_type {
            qb.push(" AND job_type = ");
            qb.push_bind(job_type.as_str());
        }

        if let Some(cursor) = page.cursor.as_ref() {
            qb.push(" AND (run_at < ");
            qb.push_bind(cursor.run_at);
            qb.push(" OR (run_at = ");
            qb.push_bind(cursor.run_at);
            qb.push(" AND id < ");
            qb.push_bind(cursor.id.clone());
            qb.push("))");
        }

        qb.push(" ORDER BY run_at DESC, id DESC LIMIT ");
        qb.push_bind(limit as i64);

        let rows = qb
            .build_query_as::<JobRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(JobRecord::try_from(row)?);
        }

        let next_cursor = if records.len() as u32 == limit {
            records
                .last()
                .map(|job| JobCursor::new(job.run_at, job.id.clone()).encode())
        } else {
            None
        };

        Ok(CursorPage::new(records, next_cursor))
    }
}
