pub mod admin;
pub mod assist;
pub mod collaborators;
pub mod engagement;
pub mod health;
pub mod media;
pub mod posts;
pub mod taxonomy;
pub mod users;
pub mod webhooks;
