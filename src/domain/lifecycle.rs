//! The post lifecycle state machine.
//!
//! Every status change in the system flows through [`plan`]: handlers and
//! services never write `posts.status` directly. The transition table below is
//! the single source of truth for which `(status, action)` pairs exist, who
//! may perform them, and which editorial timestamps they touch.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::PostRecord;
use crate::domain::types::{CollaboratorPermission, PostStatus, UserRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    Submit,
    Withdraw,
    ClaimReview,
    ReleaseReview,
    Approve,
    Reject,
    Schedule,
    Publish,
    Archive,
    Restore,
}

impl LifecycleAction {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleAction::Submit => "submit",
            LifecycleAction::Withdraw => "withdraw",
            LifecycleAction::ClaimReview => "claim_review",
            LifecycleAction::ReleaseReview => "release_review",
            LifecycleAction::Approve => "approve",
            LifecycleAction::Reject => "reject",
            LifecycleAction::Schedule => "schedule",
            LifecycleAction::Publish => "publish",
            LifecycleAction::Archive => "archive",
            LifecycleAction::Restore => "restore",
        }
    }
}

/// Minimum capability a transition demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// The post author, an admin, or a collaborator whose grant covers the action.
    AuthorEdit,
    /// An admin.
    Moderate,
    /// The scheduler (an admin may also force it).
    System,
}

/// Who is asking for the transition, resolved against one concrete post.
#[derive(Debug, Clone)]
pub enum LifecycleActor {
    System,
    User {
        id: Uuid,
        role: UserRole,
        is_author: bool,
        grants: Vec<CollaboratorPermission>,
    },
}

impl LifecycleActor {
    pub fn label(&self) -> String {
        match self {
            LifecycleActor::System => "system".to_string(),
            LifecycleActor::User { id, .. } => format!("user:{id}"),
        }
    }

    fn user_id(&self) -> Option<Uuid> {
        match self {
            LifecycleActor::System => None,
            LifecycleActor::User { id, .. } => Some(*id),
        }
    }

    fn satisfies(&self, capability: Capability, action: LifecycleAction) -> bool {
        match (self, capability) {
            (LifecycleActor::System, Capability::System) => true,
            (LifecycleActor::System, _) => false,
            (LifecycleActor::User { role, .. }, Capability::Moderate) => role.is_admin(),
            (LifecycleActor::User { role, .. }, Capability::System) => role.is_admin(),
            (
                LifecycleActor::User {
                    role,
                    is_author,
                    grants,
                    ..
                },
                Capability::AuthorEdit,
            ) => {
                if role.is_admin() || *is_author {
                    return true;
                }
                // Collaborator grants only cover submission-side actions.
                match action {
                    LifecycleAction::Submit | LifecycleAction::Withdraw => {
                        grants.contains(&CollaboratorPermission::Submit)
                    }
                    _ => false,
                }
            }
        }
    }
}

/// Extra inputs some actions require.
#[derive(Debug, Clone, Default)]
pub struct ActionParams {
    pub scheduled_for: Option<OffsetDateTime>,
    pub note: Option<String>,
}

/// The resolved outcome of a transition: the next status plus the full set of
/// editorial fields as they must be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub status: PostStatus,
    pub submitted_at: Option<OffsetDateTime>,
    pub reviewed_at: Option<OffsetDateTime>,
    pub reviewed_by: Option<Uuid>,
    pub review_note: Option<String>,
    pub scheduled_for: Option<OffsetDateTime>,
    pub published_at: Option<OffsetDateTime>,
    pub archived_at: Option<OffsetDateTime>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("cannot {action} a {from} post", action = action.as_str(), from = from.as_str())]
    InvalidTransition {
        from: PostStatus,
        action: LifecycleAction,
    },
    #[error("actor may not {action} this post", action = action.as_str())]
    Forbidden { action: LifecycleAction },
    #[error("schedule requires a publication time")]
    MissingSchedule,
    #[error("scheduled publication time is in the past")]
    ScheduleInPast,
    #[error("rejection requires a review note")]
    MissingNote,
}

struct Transition {
    from: PostStatus,
    action: LifecycleAction,
    to: PostStatus,
    capability: Capability,
}

const TRANSITIONS: &[Transition] = &[
    Transition {
        from: PostStatus::Draft,
        action: LifecycleAction::Submit,
        to: PostStatus::Submitted,
        capability: Capability::AuthorEdit,
    },
    Transition {
        from: PostStatus::Submitted,
        action: LifecycleAction::Withdraw,
        to: PostStatus::Draft,
        capability: Capability::AuthorEdit,
    },
    Transition {
        from: PostStatus::Submitted,
        action: LifecycleAction::ClaimReview,
        to: PostStatus::UnderReview,
        capability: Capability::Moderate,
    },
    Transition {
        from: PostStatus::Submitted,
        action: LifecycleAction::Approve,
        to: PostStatus::Approved,
        capability: Capability::Moderate,
    },
    Transition {
        from: PostStatus::Submitted,
        action: LifecycleAction::Reject,
        to: PostStatus::Rejected,
        capability: Capability::Moderate,
    },
    Transition {
        from: PostStatus::UnderReview,
        action: LifecycleAction::ReleaseReview,
        to: PostStatus::Submitted,
        capability: Capability::Moderate,
    },
    Transition {
        from: PostStatus::UnderReview,
        action: LifecycleAction::Approve,
        to: PostStatus::Approved,
        capability: Capability::Moderate,
    },
    Transition {
        from: PostStatus::UnderReview,
        action: LifecycleAction::Reject,
        to: PostStatus::Rejected,
        capability: Capability::Moderate,
    },
    Transition {
        from: PostStatus::Rejected,
        action: LifecycleAction::Restore,
        to: PostStatus::Draft,
        capability: Capability::AuthorEdit,
    },
    Transition {
        from: PostStatus::Approved,
        action: LifecycleAction::Schedule,
        to: PostStatus::Scheduled,
        capability: Capability::AuthorEdit,
    },
    Transition {
        from: PostStatus::Approved,
        action: LifecycleAction::Publish,
        to: PostStatus::Published,
        capability: Capability::AuthorEdit,
    },
    Transition {
        from: PostStatus::Scheduled,
        action: LifecycleAction::Withdraw,
        to: PostStatus::Approved,
        capability: Capability::AuthorEdit,
    },
    Transition {
        from: PostStatus::Scheduled,
        action: LifecycleAction::Publish,
        to: PostStatus::Published,
        capability: Capability::System,
    },
    Transition {
        from: PostStatus::Published,
        action: LifecycleAction::Archive,
        to: PostStatus::Archived,
        capability: Capability::AuthorEdit,
    },
    Transition {
        from: PostStatus::Archived,
        action: LifecycleAction::Restore,
        to: PostStatus::Draft,
        capability: Capability::AuthorEdit,
    },
];

fn lookup(from: PostStatus, action: LifecycleAction) -> Option<&'static Transition> {
    TRANSITIONS
        .iter()
        .find(|t| t.from == from && t.action == action)
}

/// Resolve a lifecycle action against the current post state.
///
/// Returns the [`StatusChange`] to persist, or the reason the transition is
/// not allowed. The function is pure; callers stamp `now`.
pub fn plan(
    post: &PostRecord,
    action: LifecycleAction,
    actor: &LifecycleActor,
    params: &ActionParams,
    now: OffsetDateTime,
) -> Result<StatusChange, LifecycleError> {
    let transition = lookup(post.status, action).ok_or(LifecycleError::InvalidTransition {
        from: post.status,
        action,
    })?;

    if !actor.satisfies(transition.capability, action) {
        return Err(LifecycleError::Forbidden { action });
    }

    let mut change = StatusChange {
        status: transition.to,
        submitted_at: post.submitted_at,
        reviewed_at: post.reviewed_at,
        reviewed_by: post.reviewed_by,
        review_note: post.review_note.clone(),
        scheduled_for: post.scheduled_for,
        published_at: post.published_at,
        archived_at: post.archived_at,
    };

    match action {
        LifecycleAction::Submit => {
            change.submitted_at = Some(now);
            change.reviewed_at = None;
            change.reviewed_by = None;
            change.review_note = None;
        }
        LifecycleAction::Withdraw => match post.status {
            PostStatus::Submitted => change.submitted_at = None,
            PostStatus::Scheduled => change.scheduled_for = None,
            _ => {}
        },
        LifecycleAction::ClaimReview => {
            change.reviewed_by = actor.user_id();
        }
        LifecycleAction::ReleaseReview => {
            change.reviewed_by = None;
        }
        LifecycleAction::Approve => {
            change.reviewed_at = Some(now);
            change.reviewed_by = actor.user_id();
            change.review_note = params.note.clone();
        }
        LifecycleAction::Reject => {
            let note = params
                .note
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or(LifecycleError::MissingNote)?;
            change.reviewed_at = Some(now);
            change.reviewed_by = actor.user_id();
            change.review_note = Some(note.to_string());
        }
        LifecycleAction::Schedule => {
            let when = params.scheduled_for.ok_or(LifecycleError::MissingSchedule)?;
            if when <= now {
                return Err(LifecycleError::ScheduleInPast);
            }
            change.scheduled_for = Some(when);
        }
        LifecycleAction::Publish => {
            // System publication of a scheduled post stamps the scheduled
            // time so the public timestamp matches what the author chose.
            let stamp = match (actor, post.status) {
                (LifecycleActor::System, PostStatus::Scheduled) => {
                    post.scheduled_for.unwrap_or(now)
                }
                _ => now,
            };
            change.published_at = Some(stamp);
            change.scheduled_for = None;
        }
        LifecycleAction::Archive => {
            change.archived_at = Some(now);
        }
        LifecycleAction::Restore => {
            change.submitted_at = None;
            change.reviewed_at = None;
            change.reviewed_by = None;
            change.review_note = None;
            change.scheduled_for = None;
            change.published_at = None;
            change.archived_at = None;
        }
    }

    Ok(change)
}

/// Actions an actor could currently take on a post, for API affordances.
pub fn available_actions(post: &PostRecord, actor: &LifecycleActor) -> Vec<LifecycleAction> {
    TRANSITIONS
        .iter()
        .filter(|t| t.from == post.status && actor.satisfies(t.capability, t.action))
        .map(|t| t.action)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn post(status: PostStatus) -> PostRecord {
        let now = datetime!(2026-01-10 12:00 UTC);
        PostRecord {
            id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            slug: "example".into(),
            title: "Example".into(),
            excerpt: "ex".into(),
            body_markdown: "body".into(),
            body_html: "<p>body</p>".into(),
            status,
            category_id: None,
            featured: false,
            review_note: None,
            submitted_at: None,
            reviewed_at: None,
            reviewed_by: None,
            scheduled_for: None,
            published_at: None,
            archived_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn author_of(post: &PostRecord) -> LifecycleActor {
        LifecycleActor::User {
            id: post.author_id,
            role: UserRole::Author,
            is_author: true,
            grants: Vec::new(),
        }
    }

    fn admin() -> LifecycleActor {
        LifecycleActor::User {
            id: Uuid::new_v4(),
            role: UserRole::Admin,
            is_author: false,
            grants: Vec::new(),
        }
    }

    fn now() -> OffsetDateTime {
        datetime!(2026-01-15 09:30 UTC)
    }

    #[test]
    fn submit_stamps_submitted_at_and_clears_review_fields() {
        let mut draft = post(PostStatus::Draft);
        draft.review_note = Some("old note".into());
        let change = plan(
            &draft,
            LifecycleAction::Submit,
            &author_of(&draft),
            &ActionParams::default(),
            now(),
        )
        .expect("submit");

        assert_eq!(change.status, PostStatus::Submitted);
        assert_eq!(change.submitted_at, Some(now()));
        assert_eq!(change.review_note, None);
    }

    #[test]
    fn absent_pairs_are_invalid_transitions() {
        let draft = post(PostStatus::Draft);
        let err = plan(
            &draft,
            LifecycleAction::Publish,
            &admin(),
            &ActionParams::default(),
            now(),
        )
        .expect_err("draft cannot publish");

        assert_eq!(
            err,
            LifecycleError::InvalidTransition {
                from: PostStatus::Draft,
                action: LifecycleAction::Publish,
            }
        );
    }

    #[test]
    fn readers_cannot_submit_foreign_drafts() {
        let draft = post(PostStatus::Draft);
        let stranger = LifecycleActor::User {
            id: Uuid::new_v4(),
            role: UserRole::Reader,
            is_author: false,
            grants: Vec::new(),
        };
        let err = plan(
            &draft,
            LifecycleAction::Submit,
            &stranger,
            &ActionParams::default(),
            now(),
        )
        .expect_err("forbidden");
        assert_eq!(
            err,
            LifecycleError::Forbidden {
                action: LifecycleAction::Submit
            }
        );
    }

    #[test]
    fn submit_grant_covers_submit_and_withdraw_only() {
        let draft = post(PostStatus::Draft);
        let collaborator = LifecycleActor::User {
            id: Uuid::new_v4(),
            role: UserRole::Author,
            is_author: false,
            grants: vec![CollaboratorPermission::Submit],
        };
        assert!(
            plan(
                &draft,
                LifecycleAction::Submit,
                &collaborator,
                &ActionParams::default(),
                now(),
            )
            .is_ok()
        );

        let published = post(PostStatus::Published);
        assert!(
            plan(
                &published,
                LifecycleAction::Archive,
                &collaborator,
                &ActionParams::default(),
                now(),
            )
            .is_err()
        );
    }

    #[test]
    fn moderation_requires_admin() {
        let submitted = post(PostStatus::Submitted);
        let err = plan(
            &submitted,
            LifecycleAction::Approve,
            &author_of(&submitted),
            &ActionParams::default(),
            now(),
        )
        .expect_err("authors cannot approve their own work");
        assert_eq!(
            err,
            LifecycleError::Forbidden {
                action: LifecycleAction::Approve
            }
        );
    }

    #[test]
    fn approve_straight_from_submitted_is_allowed() {
        let submitted = post(PostStatus::Submitted);
        let change = plan(
            &submitted,
            LifecycleAction::Approve,
            &admin(),
            &ActionParams::default(),
            now(),
        )
        .expect("approve without claim");
        assert_eq!(change.status, PostStatus::Approved);
        assert_eq!(change.reviewed_at, Some(now()));
        assert!(change.reviewed_by.is_some());
    }

    #[test]
    fn reject_requires_a_note() {
        let submitted = post(PostStatus::Submitted);
        let err = plan(
            &submitted,
            LifecycleAction::Reject,
            &admin(),
            &ActionParams::default(),
            now(),
        )
        .expect_err("note required");
        assert_eq!(err, LifecycleError::MissingNote);

        let change = plan(
            &submitted,
            LifecycleAction::Reject,
            &admin(),
            &ActionParams {
                note: Some("  needs sources  ".into()),
                ..Default::default()
            },
            now(),
        )
        .expect("reject with note");
        assert_eq!(change.status, PostStatus::Rejected);
        assert_eq!(change.review_note.as_deref(), Some("needs sources"));
    }

    #[test]
    fn schedule_rejects_past_times() {
        let approved = post(PostStatus::Approved);
        let err = plan(
            &approved,
            LifecycleAction::Schedule,
            &author_of(&approved),
            &ActionParams {
                scheduled_for: Some(datetime!(2026-01-01 00:00 UTC)),
                ..Default::default()
            },
            now(),
        )
        .expect_err("past schedule");
        assert_eq!(err, LifecycleError::ScheduleInPast);
    }

    #[test]
    fn system_publish_stamps_the_scheduled_time() {
        let mut scheduled = post(PostStatus::Scheduled);
        let when = datetime!(2026-01-15 08:00 UTC);
        scheduled.scheduled_for = Some(when);

        let change = plan(
            &scheduled,
            LifecycleAction::Publish,
            &LifecycleActor::System,
            &ActionParams::default(),
            now(),
        )
        .expect("system publish");
        assert_eq!(change.status, PostStatus::Published);
        assert_eq!(change.published_at, Some(when));
        assert_eq!(change.scheduled_for, None);
    }

    #[test]
    fn withdrawing_a_scheduled_post_cancels_the_schedule() {
        let mut scheduled = post(PostStatus::Scheduled);
        scheduled.scheduled_for = Some(datetime!(2026-02-01 08:00 UTC));

        let change = plan(
            &scheduled,
            LifecycleAction::Withdraw,
            &author_of(&scheduled),
            &ActionParams::default(),
            now(),
        )
        .expect("withdraw schedule");
        assert_eq!(change.status, PostStatus::Approved);
        assert_eq!(change.scheduled_for, None);
    }

    #[test]
    fn restore_clears_every_editorial_timestamp() {
        let mut archived = post(PostStatus::Archived);
        archived.submitted_at = Some(now());
        archived.reviewed_at = Some(now());
        archived.reviewed_by = Some(Uuid::new_v4());
        archived.published_at = Some(now());
        archived.archived_at = Some(now());

        let change = plan(
            &archived,
            LifecycleAction::Restore,
            &author_of(&archived),
            &ActionParams::default(),
            now(),
        )
        .expect("restore");
        assert_eq!(change.status, PostStatus::Draft);
        assert_eq!(change.submitted_at, None);
        assert_eq!(change.reviewed_at, None);
        assert_eq!(change.reviewed_by, None);
        assert_eq!(change.published_at, None);
        assert_eq!(change.archived_at, None);
    }

    #[test]
    fn available_actions_reflect_capability() {
        let submitted = post(PostStatus::Submitted);
        let for_admin = available_actions(&submitted, &admin());
        assert!(for_admin.contains(&LifecycleAction::ClaimReview));
        assert!(for_admin.contains(&LifecycleAction::Approve));

        let for_author = available_actions(&submitted, &author_of(&submitted));
        assert_eq!(for_author, vec![LifecycleAction::Withdraw]);
    }
}
