use std::sync::Arc;

use apalis::prelude::Error as ApalisError;

use crate::application::posts::PostService;
use crate::application::repos::PostsRepo;

/// Shared context passed to job workers.
#[derive(Clone)]
pub struct JobWorkerContext {
    pub posts: Arc<PostService>,
    pub posts_reader: Arc<dyn PostsRepo>,
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convert any error into an [`ApalisError::Failed`].
pub fn job_failed<E>(err: E) -> ApalisError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let boxed: BoxError = Box::new(err);
    ApalisError::Failed(Arc::new(boxed))
}
