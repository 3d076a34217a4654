//! Access resolution for posts shared with collaborators.

use uuid::Uuid;

use crate::domain::entities::{CollaboratorGrantRecord, PostRecord, UserRecord};
use crate::domain::lifecycle::LifecycleActor;
use crate::domain::types::CollaboratorPermission;

/// What a concrete user may do with a concrete post, resolved from role,
/// authorship, and collaborator grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostAccess {
    pub can_view: bool,
    pub can_edit_content: bool,
    pub can_comment: bool,
    pub can_manage_collaborators: bool,
}

impl PostAccess {
    pub const NONE: PostAccess = PostAccess {
        can_view: false,
        can_edit_content: false,
        can_comment: false,
        can_manage_collaborators: false,
    };
}

/// Resolve access for `user` on `post` given the post's collaborator grants.
///
/// Admins and the author get everything. Collaborators get what their grants
/// say, plus view. Everyone else sees the post only when it is published.
pub fn resolve_access(
    post: &PostRecord,
    user: &UserRecord,
    grants: &[CollaboratorGrantRecord],
) -> PostAccess {
    if user.suspended {
        return PostAccess {
            can_view: post.status.publicly_visible(),
            ..PostAccess::NONE
        };
    }

    if user.role.is_admin() || post.author_id == user.id {
        return PostAccess {
            can_view: true,
            can_edit_content: true,
            can_comment: true,
            can_manage_collaborators: true,
        };
    }

    let mine: Vec<CollaboratorPermission> = grants
        .iter()
        .filter(|g| g.post_id == post.id && g.user_id == user.id)
        .map(|g| g.permission)
        .collect();

    if mine.is_empty() {
        return PostAccess {
            can_view: post.status.publicly_visible(),
            ..PostAccess::NONE
        };
    }

    PostAccess {
        can_view: true,
        can_edit_content: mine.contains(&CollaboratorPermission::Edit),
        can_comment: mine.contains(&CollaboratorPermission::Comment)
            || mine.contains(&CollaboratorPermission::Edit),
        can_manage_collaborators: false,
    }
}

/// Build the lifecycle actor for `user` acting on `post`.
pub fn lifecycle_actor(
    post: &PostRecord,
    user: &UserRecord,
    grants: &[CollaboratorGrantRecord],
) -> LifecycleActor {
    let mine: Vec<CollaboratorPermission> = grants
        .iter()
        .filter(|g| g.post_id == post.id && g.user_id == user.id)
        .map(|g| g.permission)
        .collect();

    LifecycleActor::User {
        id: user.id,
        role: user.role,
        is_author: post.author_id == user.id,
        grants: mine,
    }
}

/// Authors cannot be their own collaborators, and a grant must come from
/// someone allowed to manage the post.
pub fn validate_grant(post: &PostRecord, grantee: Uuid) -> Result<(), &'static str> {
    if post.author_id == grantee {
        return Err("the author already holds every permission on their post");
    }
    Ok(())
}
