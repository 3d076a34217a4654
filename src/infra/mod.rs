//! Infrastructure adapters and runtime bootstrap.

pub mod assist;
pub mod db;
pub mod error;
pub mod http;
pub mod identity;
pub mod telemetry;
