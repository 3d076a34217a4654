pub mod assist;
pub mod audit;
pub mod bookmarks;
pub mod collaborators;
pub mod comments;
pub mod error;
pub mod identity;
pub mod jobs;
pub mod media;
pub mod moderation;
pub mod pagination;
pub mod posts;
pub mod reactions;
pub mod render;
pub mod repos;
pub mod taxonomy;
pub mod users;
