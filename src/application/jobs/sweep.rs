//! Cron sweep catching scheduled posts whose publish job was lost.

use std::str::FromStr;

use apalis::prelude::*;
use cron::Schedule;
use time::OffsetDateTime;
use tracing::{info, warn};

use super::context::JobWorkerContext;

const SWEEP_BATCH: u32 = 50;

/// Marker for the cron-triggered sweep.
/// Must implement `From<chrono::DateTime<chrono::Utc>>` for apalis-cron compatibility.
#[derive(Default, Debug, Clone)]
pub struct DueSweepJob;

impl From<chrono::DateTime<chrono::Utc>> for DueSweepJob {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

pub async fn process_due_sweep_job(
    _job: DueSweepJob,
    ctx: Data<JobWorkerContext>,
) -> Result<(), apalis::prelude::Error> {
    let now = OffsetDateTime::now_utc();
    let due = match ctx.posts_reader.list_due_scheduled(now, SWEEP_BATCH).await {
        Ok(due) => due,
        Err(err) => {
            warn!(error = %err, "due-post sweep could not query scheduled posts");
            return Ok(());
        }
    };

    let mut published = 0u32;
    for post in due {
        match ctx.posts.system_publish(post.id).await {
            Ok(_) => published += 1,
            Err(err) => {
                warn!(post_id = %post.id, error = %err, "sweep failed to publish due post");
            }
        }
    }

    if published > 0 {
        info!(published, "due-post sweep published overdue posts");
    }

    Ok(())
}

/// Runs every minute; the sweep is a safety net behind the queued jobs.
pub fn due_sweep_schedule() -> Schedule {
    Schedule::from_str("0 * * * * *").expect("Invalid cron expression for due sweep")
}
