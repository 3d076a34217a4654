use std::sync::Arc;

use crate::application::audit::AuditService;
use crate::application::render::RenderService;
use crate::application::repos::{
    CollaboratorsRepo, JobsRepo, PostsRepo, PostsWriteRepo, TaxonomyRepo,
};

/// Orchestrates post content and lifecycle operations for authors, admins,
/// and the scheduler.
#[derive(Clone)]
pub struct PostService {
    pub(crate) reader: Arc<dyn PostsRepo>,
    pub(crate) writer: Arc<dyn PostsWriteRepo>,
    pub(crate) collaborators: Arc<dyn CollaboratorsRepo>,
    pub(crate) taxonomy: Arc<dyn TaxonomyRepo>,
    pub(crate) jobs: Arc<dyn JobsRepo>,
    pub(crate) renderer: RenderService,
    pub(crate) audit: AuditService,
}

impl PostService {
    pub fn new(
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        collaborators: Arc<dyn CollaboratorsRepo>,
        taxonomy: Arc<dyn TaxonomyRepo>,
        jobs: Arc<dyn JobsRepo>,
        renderer: RenderService,
        audit: AuditService,
    ) -> Self {
        Self {
            reader,
            writer,
            collaborators,
            taxonomy,
            jobs,
            renderer,
            audit,
        }
    }
}
