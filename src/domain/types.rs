//! Shared domain enumerations aligned with persisted database enums.

use serde::{Deserialize, Serialize};

/// Editorial state of a post. Transitions between states are governed by the
/// table in [`crate::domain::lifecycle`]; nothing else writes this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "post_status", rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Submitted,
    UnderReview,
    Approved,
    Rejected,
    Scheduled,
    Published,
    Archived,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Submitted => "submitted",
            PostStatus::UnderReview => "under_review",
            PostStatus::Approved => "approved",
            PostStatus::Rejected => "rejected",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Published => "published",
            PostStatus::Archived => "archived",
        }
    }

    /// Statuses that sit in the moderation queue awaiting an admin decision.
    pub fn in_moderation_queue(self) -> bool {
        matches!(self, PostStatus::Submitted | PostStatus::UnderReview)
    }

    /// Only published posts are visible without authentication.
    pub fn publicly_visible(self) -> bool {
        self == PostStatus::Published
    }

    /// Content (title, body, excerpt) may only change in these states.
    pub fn content_editable(self) -> bool {
        matches!(self, PostStatus::Draft | PostStatus::Rejected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
pub enum UserRole {
    Reader,
    Author,
    Admin,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Reader => "reader",
            UserRole::Author => "author",
            UserRole::Admin => "admin",
        }
    }

    pub fn can_author(self) -> bool {
        matches!(self, UserRole::Author | UserRole::Admin)
    }

    pub fn is_admin(self) -> bool {
        self == UserRole::Admin
    }
}

/// Per-post permission granted to a collaborator by the post author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "collaborator_permission", rename_all = "snake_case")]
pub enum CollaboratorPermission {
    Edit,
    Comment,
    Submit,
}

impl CollaboratorPermission {
    pub fn as_str(self) -> &'static str {
        match self {
            CollaboratorPermission::Edit => "edit",
            CollaboratorPermission::Comment => "comment",
            CollaboratorPermission::Submit => "submit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "reaction_kind", rename_all = "snake_case")]
pub enum ReactionKind {
    Like,
    Clap,
    Insight,
}

impl ReactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Clap => "clap",
            ReactionKind::Insight => "insight",
        }
    }
}

impl TryFrom<&str> for ReactionKind {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "like" => Ok(ReactionKind::Like),
            "clap" => Ok(ReactionKind::Clap),
            "insight" => Ok(ReactionKind::Insight),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "comment_status", rename_all = "snake_case")]
pub enum CommentStatus {
    Visible,
    Hidden,
    Deleted,
}

impl CommentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CommentStatus::Visible => "visible",
            CommentStatus::Hidden => "hidden",
            CommentStatus::Deleted => "deleted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Scheduled,
    Running,
    Done,
    Failed,
    Killed,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "Pending",
            JobState::Scheduled => "Scheduled",
            JobState::Running => "Running",
            JobState::Done => "Done",
            JobState::Failed => "Failed",
            JobState::Killed => "Killed",
        }
    }
}

impl TryFrom<&str> for JobState {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "Pending" | "Latest" => Ok(JobState::Pending),
            "Scheduled" => Ok(JobState::Scheduled),
            "Running" => Ok(JobState::Running),
            "Done" => Ok(JobState::Done),
            "Failed" => Ok(JobState::Failed),
            "Killed" => Ok(JobState::Killed),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    PublishPost,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::PublishPost => "publish_post",
        }
    }
}

impl TryFrom<&str> for JobType {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "publish_post" => Ok(JobType::PublishPost),
            _ => Err(()),
        }
    }
}
