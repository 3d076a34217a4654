pub mod collaborators;
pub mod entities;
pub mod error;
pub mod lifecycle;
pub mod slug;
pub mod types;
