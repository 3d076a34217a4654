use apalis::prelude::{Data, Error as ApalisError};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::posts::PostError;
use crate::application::repos::{JobsRepo, RepoError};
use crate::domain::lifecycle::LifecycleError;
use crate::domain::types::JobType;

use super::{
    context::{JobWorkerContext, job_failed},
    queue::enqueue_job,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishPostJobPayload {
    pub post_id: Uuid,
}

pub async fn enqueue_publish_post_job<J: JobsRepo + ?Sized>(
    repo: &J,
    post_id: Uuid,
    run_at: OffsetDateTime,
) -> Result<String, RepoError> {
    let payload = PublishPostJobPayload { post_id };
    enqueue_job(repo, JobType::PublishPost, &payload, Some(run_at), 10, 10).await
}

/// Publish a scheduled post when its time arrives. The lifecycle table is
/// re-consulted at run time: a post withdrawn after scheduling simply skips.
pub async fn process_publish_post_job(
    payload: PublishPostJobPayload,
    context: Data<JobWorkerContext>,
) -> Result<(), ApalisError> {
    let ctx = &*context;

    match ctx.posts.system_publish(payload.post_id).await {
        Ok(post) => {
            metrics::counter!("foglio_publish_jobs_total", "outcome" => "published").increment(1);
            info!(
                target = "application::jobs::process_publish_post_job",
                post_id = %post.id,
                slug = post.slug,
                "post published"
            );
            Ok(())
        }
        // The post left the scheduled state after this job was queued.
        Err(PostError::Lifecycle(LifecycleError::InvalidTransition { from, .. })) => {
            metrics::counter!("foglio_publish_jobs_total", "outcome" => "skipped").increment(1);
            warn!(
                target = "application::jobs::process_publish_post_job",
                post_id = %payload.post_id,
                status = from.as_str(),
                "skipping publish job for post no longer scheduled"
            );
            Ok(())
        }
        Err(PostError::NotFound) => {
            warn!(
                target = "application::jobs::process_publish_post_job",
                post_id = %payload.post_id,
                "skipping publish job for deleted post"
            );
            Ok(())
        }
        Err(err) => Err(job_failed(err)),
    }
}
