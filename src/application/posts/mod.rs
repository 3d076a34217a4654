mod commands;
mod queries;
mod service;
mod types;

pub use queries::PostDetail;
pub use service::PostService;
pub use types::{
    CreatePostCommand, LifecycleCommand, PostError, UpdatePostContentCommand, ensure_non_empty,
};
