//! Shared cursor pagination helpers.
//!
//! Cursors are serde payloads, JSON-encoded and wrapped in url-safe base64.
//! Each listing keeps enough of its sort key in the cursor to resume a keyset
//! query without offset arithmetic.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::PostStatus;

#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
}

fn encode_payload<P: Serialize>(payload: &P) -> String {
    // Cursor payloads are plain structs; serialization cannot fail.
    let serialized = serde_json::to_vec(payload).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(serialized)
}

fn decode_payload<P: DeserializeOwned>(cursor: &str) -> Result<P, PaginationError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|err| PaginationError::InvalidCursor(err.to_string()))
}

/// Which listing a post cursor belongs to. A cursor minted for the public
/// feed must not resume an authenticated or administrative listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostScope {
    Public,
    Author,
    Admin,
}

/// Cursor for post listings. `sort_key` is `published_at` for the public
/// scope and `updated_at` elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCursor {
    pub scope: PostScope,
    pub status: Option<PostStatus>,
    pub sort_key: OffsetDateTime,
    pub id: Uuid,
}

impl PostCursor {
    pub fn public(sort_key: OffsetDateTime, id: Uuid) -> Self {
        Self {
            scope: PostScope::Public,
            status: Some(PostStatus::Published),
            sort_key,
            id,
        }
    }

    pub fn author(status: Option<PostStatus>, sort_key: OffsetDateTime, id: Uuid) -> Self {
        Self {
            scope: PostScope::Author,
            status,
            sort_key,
            id,
        }
    }

    pub fn admin(status: Option<PostStatus>, sort_key: OffsetDateTime, id: Uuid) -> Self {
        Self {
            scope: PostScope::Admin,
            status,
            sort_key,
            id,
        }
    }

    pub fn encode(&self) -> String {
        encode_payload(self)
    }

    pub fn decode(cursor: &str) -> Result<Self, PaginationError> {
        decode_payload(cursor)
    }
}

/// Cursor for the moderation queue, ordered by submission time ascending so
/// the oldest submission is reviewed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCursor {
    pub submitted_at: OffsetDateTime,
    pub id: Uuid,
}

impl QueueCursor {
    pub fn new(submitted_at: OffsetDateTime, id: Uuid) -> Self {
        Self { submitted_at, id }
    }

    pub fn encode(&self) -> String {
        encode_payload(self)
    }

    pub fn decode(cursor: &str) -> Result<Self, PaginationError> {
        decode_payload(cursor)
    }
}

/// Reverse-chronological cursor shared by comments, users, media, bookmarks,
/// and the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeCursor {
    pub created_at: OffsetDateTime,
    pub id: Uuid,
}

impl TimeCursor {
    pub fn new(created_at: OffsetDateTime, id: Uuid) -> Self {
        Self { created_at, id }
    }

    pub fn encode(&self) -> String {
        encode_payload(self)
    }

    pub fn decode(cursor: &str) -> Result<Self, PaginationError> {
        decode_payload(cursor)
    }
}

/// Cursor for the scheduled-job listing; job ids are strings under apalis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCursor {
    pub run_at: OffsetDateTime,
    pub id: String,
}

impl JobCursor {
    pub fn new(run_at: OffsetDateTime, id: impl Into<String>) -> Self {
        Self {
            run_at,
            id: id.into(),
        }
    }

    pub fn encode(&self) -> String {
        encode_payload(self)
    }

    pub fn decode(cursor: &str) -> Result<Self, PaginationError> {
        decode_payload(cursor)
    }
}

/// Cursor-aware pagination request.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<C> {
    pub limit: u32,
    pub cursor: Option<C>,
}

impl<C> PageRequest<C> {
    pub fn new(limit: u32, cursor: Option<C>) -> Self {
        Self { limit, cursor }
    }

    pub fn first(limit: u32) -> Self {
        Self {
            limit,
            cursor: None,
        }
    }
}

/// Cursor-aware page result.
#[derive(Debug, Clone, Serialize)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> CursorPage<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
        }
    }

    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> CursorPage<U> {
        CursorPage {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_cursor_keeps_scope_and_status() {
        let id = Uuid::new_v4();
        let when = OffsetDateTime::now_utc();
        let cursor = PostCursor::admin(Some(PostStatus::Submitted), when, id);
        let decoded = PostCursor::decode(&cursor.encode()).expect("decode");

        assert_eq!(decoded.scope, PostScope::Admin);
        assert_eq!(decoded.status, Some(PostStatus::Submitted));
        assert_eq!(decoded.id, id);
    }

    #[test]
    fn queue_cursor_round_trip() {
        let cursor = QueueCursor::new(OffsetDateTime::now_utc(), Uuid::new_v4());
        assert_eq!(QueueCursor::decode(&cursor.encode()).expect("decode"), cursor);
    }

    #[test]
    fn garbage_cursors_are_rejected() {
        let err = TimeCursor::decode("definitely not base64 json").expect_err("rejected");
        assert!(matches!(err, PaginationError::InvalidCursor(_)));
    }
}
