use std::sync::Arc;

use crate::application::assist::AssistService;
use crate::application::audit::AuditService;
use crate::application::bookmarks::BookmarkService;
use crate::application::collaborators::CollaboratorService;
use crate::application::comments::CommentService;
use crate::application::identity::IdentityService;
use crate::application::media::MediaService;
use crate::application::moderation::ModerationService;
use crate::application::posts::PostService;
use crate::application::reactions::ReactionService;
use crate::application::repos::JobsRepo;
use crate::application::taxonomy::TaxonomyService;
use crate::application::users::UserService;

use super::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<IdentityService>,
    pub posts: Arc<PostService>,
    pub moderation: Arc<ModerationService>,
    pub collaborators: Arc<CollaboratorService>,
    pub comments: Arc<CommentService>,
    pub reactions: Arc<ReactionService>,
    pub bookmarks: Arc<BookmarkService>,
    pub taxonomy: Arc<TaxonomyService>,
    pub users: Arc<UserService>,
    pub media: Arc<MediaService>,
    pub assist: Arc<AssistService>,
    pub audit: AuditService,
    pub jobs: Arc<dyn JobsRepo>,
    pub rate_limiter: Arc<RateLimiter>,
    pub webhook_secret: Arc<str>,
}
