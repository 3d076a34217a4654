use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::jobs::enqueue_publish_post_job;
use crate::application::repos::{
    CreatePostParams, RepoError, UpdatePostParams, UpdatePostStatusParams,
};
use crate::domain::collaborators::{lifecycle_actor, resolve_access};
use crate::domain::entities::{PostRecord, UserRecord};
use crate::domain::lifecycle::{self, ActionParams, LifecycleAction, LifecycleActor};
use crate::domain::slug::{SlugError, SlugUniqueError, unique_slug};
use crate::domain::types::PostStatus;

use super::service::PostService;
use super::types::{
    CreatePostCommand, LifecycleCommand, LifecycleSnapshot, PostError, PostSnapshot,
    UpdatePostContentCommand, ensure_non_empty,
};

impl PostService {
    pub async fn create_post(
        &self,
        user: &UserRecord,
        command: CreatePostCommand,
    ) -> Result<PostRecord, PostError> {
        if !user.role.can_author() || user.suspended {
            return Err(PostError::Forbidden("only authors may create posts"));
        }
        ensure_non_empty(&command.title, "title")?;
        ensure_non_empty(&command.body_markdown, "body_markdown")?;

        if let Some(category_id) = command.category_id {
            self.taxonomy
                .find_category_by_id(category_id)
                .await?
                .ok_or(PostError::ConstraintViolation("category"))?;
        }

        let reader = self.reader.clone();
        let slug = match unique_slug(&command.title, move |candidate| {
            let reader = reader.clone();
            let candidate = candidate.to_string();
            async move {
                reader
                    .find_by_slug(&candidate)
                    .await
                    .map(|existing| existing.is_none())
            }
        })
        .await
        {
            Ok(slug) => slug,
            Err(SlugUniqueError::Slug(SlugError::Exhausted { .. })) => {
                return Err(PostError::ConstraintViolation("slug"));
            }
            Err(SlugUniqueError::Slug(_)) => {
                return Err(PostError::ConstraintViolation("title"));
            }
            Err(SlugUniqueError::Predicate(err)) => return Err(PostError::Repo(err)),
        };

        let body_html = self.renderer.render_markdown(&command.body_markdown);

        let post = self
            .writer
            .create_post(CreatePostParams {
                author_id: user.id,
                slug,
                title: command.title,
                excerpt: command.excerpt,
                body_markdown: command.body_markdown,
                body_html,
                category_id: command.category_id,
            })
            .await?;

        let snapshot = PostSnapshot {
            slug: &post.slug,
            title: &post.title,
            status: post.status,
        };
        self.audit
            .record(
                &format!("user:{}", user.id),
                "post.create",
                "post",
                Some(&post.id.to_string()),
                Some(&snapshot),
            )
            .await?;

        Ok(post)
    }

    pub async fn update_content(
        &self,
        user: &UserRecord,
        command: UpdatePostContentCommand,
    ) -> Result<PostRecord, PostError> {
        ensure_non_empty(&command.title, "title")?;
        ensure_non_empty(&command.body_markdown, "body_markdown")?;

        let post = self.load(command.id).await?;
        let grants = self
            .collaborators
            .list_for_user_on_post(post.id, user.id)
            .await?;
        let access = resolve_access(&post, user, &grants);
        if !access.can_edit_content {
            return Err(PostError::Forbidden("no edit permission on this post"));
        }
        if !post.status.content_editable() {
            return Err(PostError::ConstraintViolation(
                "content is frozen outside draft and rejected states",
            ));
        }

        if let Some(category_id) = command.category_id {
            self.taxonomy
                .find_category_by_id(category_id)
                .await?
                .ok_or(PostError::ConstraintViolation("category"))?;
        }

        let body_html = self.renderer.render_markdown(&command.body_markdown);

        let updated = self
            .writer
            .update_post(UpdatePostParams {
                id: post.id,
                slug: post.slug.clone(),
                title: command.title,
                excerpt: command.excerpt,
                body_markdown: command.body_markdown,
                body_html,
                category_id: command.category_id,
                featured: post.featured,
            })
            .await?;

        let snapshot = PostSnapshot {
            slug: &updated.slug,
            title: &updated.title,
            status: updated.status,
        };
        self.audit
            .record(
                &format!("user:{}", user.id),
                "post.update",
                "post",
                Some(&updated.id.to_string()),
                Some(&snapshot),
            )
            .await?;

        Ok(updated)
    }

    /// Apply a lifecycle action on behalf of a user.
    pub async fn apply_lifecycle(
        &self,
        user: &UserRecord,
        command: LifecycleCommand,
    ) -> Result<PostRecord, PostError> {
        let post = self.load(command.post_id).await?;
        let grants = self
            .collaborators
            .list_for_user_on_post(post.id, user.id)
            .await?;
        let actor = lifecycle_actor(&post, user, &grants);
        self.run_transition(post, command, actor).await
    }

    /// Publish a due scheduled post on behalf of the scheduler.
    pub async fn system_publish(&self, post_id: Uuid) -> Result<PostRecord, PostError> {
        let post = self.load(post_id).await?;
        let command = LifecycleCommand {
            post_id,
            action: LifecycleAction::Publish,
            note: None,
            scheduled_for: None,
        };
        self.run_transition(post, command, LifecycleActor::System)
            .await
    }

    async fn run_transition(
        &self,
        post: PostRecord,
        command: LifecycleCommand,
        actor: LifecycleActor,
    ) -> Result<PostRecord, PostError> {
        let params = ActionParams {
            scheduled_for: command.scheduled_for,
            note: command.note,
        };
        let change =
            match lifecycle::plan(&post, command.action, &actor, &params, OffsetDateTime::now_utc()) {
                Ok(change) => change,
                Err(err) => {
                    metrics::counter!("foglio_lifecycle_rejected_total").increment(1);
                    return Err(err.into());
                }
            };

        let from = post.status;
        let scheduled_for = change.scheduled_for;
        let updated = self
            .writer
            .update_post_status(UpdatePostStatusParams {
                id: post.id,
                change,
            })
            .await?;

        match (command.action, from) {
            (LifecycleAction::Schedule, _) => {
                let run_at = scheduled_for
                    .ok_or_else(|| RepoError::from_persistence("schedule lost its timestamp"))?;
                enqueue_publish_post_job(self.jobs.as_ref(), updated.id, run_at).await?;
            }
            // Leaving the scheduled state by hand invalidates any queued job.
            (LifecycleAction::Withdraw, PostStatus::Scheduled)
            | (LifecycleAction::Publish, PostStatus::Scheduled) => {
                if !matches!(actor, LifecycleActor::System) {
                    self.jobs.cancel_jobs_for_post(updated.id).await?;
                }
            }
            _ => {}
        }

        metrics::counter!(
            "foglio_lifecycle_transition_total",
            "action" => command.action.as_str(),
        )
        .increment(1);

        let snapshot = LifecycleSnapshot {
            slug: &updated.slug,
            action: command.action,
            from,
            to: updated.status,
            note: updated.review_note.as_deref(),
        };
        self.audit
            .record(
                &actor.label(),
                &format!("post.{}", command.action.as_str()),
                "post",
                Some(&updated.id.to_string()),
                Some(&snapshot),
            )
            .await?;

        Ok(updated)
    }

    pub async fn delete_post(&self, user: &UserRecord, id: Uuid) -> Result<(), PostError> {
        let post = self.load(id).await?;
        let allowed = user.role.is_admin()
            || (post.author_id == user.id && post.status != PostStatus::Published);
        if !allowed {
            return Err(PostError::Forbidden(
                "published posts can only be deleted by an admin",
            ));
        }

        self.jobs.cancel_jobs_for_post(id).await?;
        self.writer.delete_post(id).await?;
        self.audit
            .record(
                &format!("user:{}", user.id),
                "post.delete",
                "post",
                Some(&id.to_string()),
                Option::<&PostSnapshot<'_>>::None,
            )
            .await?;

        Ok(())
    }

    /// Admin-only flag controlling front-page placement.
    pub async fn set_featured(
        &self,
        user: &UserRecord,
        id: Uuid,
        featured: bool,
    ) -> Result<PostRecord, PostError> {
        if !user.role.is_admin() {
            return Err(PostError::Forbidden("only admins may feature posts"));
        }
        let post = self.load(id).await?;

        let updated = self
            .writer
            .update_post(UpdatePostParams {
                id: post.id,
                slug: post.slug.clone(),
                title: post.title.clone(),
                excerpt: post.excerpt.clone(),
                body_markdown: post.body_markdown.clone(),
                body_html: post.body_html.clone(),
                category_id: post.category_id,
                featured,
            })
            .await?;

        let action = if featured {
            "post.feature"
        } else {
            "post.unfeature"
        };
        let snapshot = PostSnapshot {
            slug: &updated.slug,
            title: &updated.title,
            status: updated.status,
        };
        self.audit
            .record(
                &format!("user:{}", user.id),
                action,
                "post",
                Some(&updated.id.to_string()),
                Some(&snapshot),
            )
            .await?;

        Ok(updated)
    }

    pub async fn replace_tags(
        &self,
        user: &UserRecord,
        id: Uuid,
        tag_ids: &[Uuid],
    ) -> Result<(), PostError> {
        let post = self.load(id).await?;
        let grants = self
            .collaborators
            .list_for_user_on_post(post.id, user.id)
            .await?;
        let access = resolve_access(&post, user, &grants);
        if !access.can_edit_content {
            return Err(PostError::Forbidden("no edit permission on this post"));
        }

        let mut deduped = Vec::new();
        for tag_id in tag_ids {
            if !deduped.contains(tag_id) {
                deduped.push(*tag_id);
            }
        }

        self.writer.replace_post_tags(post.id, &deduped).await?;
        self.audit
            .record(
                &format!("user:{}", user.id),
                "post.tags",
                "post",
                Some(&post.id.to_string()),
                Some(&deduped),
            )
            .await?;

        Ok(())
    }

    pub(crate) async fn load(&self, id: Uuid) -> Result<PostRecord, PostError> {
        self.reader
            .find_by_id(id)
            .await?
            .ok_or(PostError::NotFound)
    }
}
