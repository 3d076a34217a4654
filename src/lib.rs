//! Foglio is a multi-tenant publishing backend: authors draft and submit
//! posts, admins moderate them, readers comment, react, and bookmark.
//! Identity is delegated to a hosted provider; scheduled publication runs
//! through a Postgres-backed job queue.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
