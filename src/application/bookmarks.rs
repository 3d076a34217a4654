use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::{CursorPage, PageRequest, TimeCursor};
use crate::application::repos::{BookmarksRepo, PostsRepo, RepoError};
use crate::domain::entities::{BookmarkRecord, PostRecord, UserRecord};

#[derive(Debug, Error)]
pub enum BookmarkError {
    #[error("post not found")]
    PostNotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct BookmarkService {
    posts: Arc<dyn PostsRepo>,
    bookmarks: Arc<dyn BookmarksRepo>,
}

/// A bookmark joined with the post it points at. Posts that have since been
/// unpublished keep their bookmark but are listed without content.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BookmarkedPost {
    pub bookmark: BookmarkRecord,
    pub post: Option<PostRecord>,
}

impl BookmarkService {
    pub fn new(posts: Arc<dyn PostsRepo>, bookmarks: Arc<dyn BookmarksRepo>) -> Self {
        Self { posts, bookmarks }
    }

    pub async fn add(&self, user: &UserRecord, post_id: Uuid) -> Result<(), BookmarkError> {
        let post = self
            .posts
            .find_by_id(post_id)
            .await?
            .filter(|post| post.status.publicly_visible())
            .ok_or(BookmarkError::PostNotFound)?;
        // Adding twice is a no-op.
        if self.bookmarks.exists(user.id, post.id).await? {
            return Ok(());
        }
        self.bookmarks.add(user.id, post.id).await?;
        Ok(())
    }

    pub async fn remove(&self, user: &UserRecord, post_id: Uuid) -> Result<bool, BookmarkError> {
        Ok(self.bookmarks.remove(user.id, post_id).await?)
    }

    pub async fn list(
        &self,
        user: &UserRecord,
        page: PageRequest<TimeCursor>,
    ) -> Result<CursorPage<BookmarkedPost>, BookmarkError> {
        let bookmarks = self.bookmarks.list_for_user(user.id, page).await?;

        let mut items = Vec::with_capacity(bookmarks.items.len());
        for bookmark in bookmarks.items {
            let post = self
                .posts
                .find_by_id(bookmark.post_id)
                .await?
                .filter(|post| post.status.publicly_visible());
            items.push(BookmarkedPost { bookmark, post });
        }

        Ok(CursorPage::new(items, bookmarks.next_cursor))
    }
}
