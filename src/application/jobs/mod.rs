mod context;
mod publish;
mod queue;
mod sweep;

pub use context::{JobWorkerContext, job_failed};
pub use publish::{PublishPostJobPayload, enqueue_publish_post_job, process_publish_post_job};
pub use queue::enqueue_job;
pub use sweep::{DueSweepJob, due_sweep_schedule, process_due_sweep_job};
