use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::audit::AuditService;
use crate::application::repos::RepoError;
use crate::domain::entities::UserRecord;

#[derive(Debug, Error)]
pub enum AssistError {
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    Invalid(&'static str),
    #[error("assist provider failed: {0}")]
    Provider(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneTarget {
    Formal,
    Casual,
    Concise,
}

impl ToneTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            ToneTarget::Formal => "formal",
            ToneTarget::Casual => "casual",
            ToneTarget::Concise => "concise",
        }
    }
}

/// Content-assistance backend. The production implementation talks to an
/// OpenAI-compatible HTTP API; tests substitute a canned provider.
#[async_trait]
pub trait AssistProvider: Send + Sync {
    async fn suggest_titles(&self, body_markdown: &str) -> Result<Vec<String>, AssistError>;

    async fn outline(&self, topic: &str) -> Result<Vec<String>, AssistError>;

    async fn rewrite_tone(
        &self,
        body_markdown: &str,
        tone: ToneTarget,
    ) -> Result<String, AssistError>;

    async fn cover_prompt(&self, title: &str, excerpt: &str) -> Result<String, AssistError>;
}

const MAX_ASSIST_INPUT: usize = 60_000;

#[derive(Clone)]
pub struct AssistService {
    provider: Arc<dyn AssistProvider>,
    audit: AuditService,
}

impl AssistService {
    pub fn new(provider: Arc<dyn AssistProvider>, audit: AuditService) -> Self {
        Self { provider, audit }
    }

    pub async fn suggest_titles(
        &self,
        user: &UserRecord,
        body_markdown: &str,
    ) -> Result<Vec<String>, AssistError> {
        self.check(user, body_markdown)?;
        let titles = self.provider.suggest_titles(body_markdown).await?;
        self.record(user, "assist.titles").await?;
        Ok(titles)
    }

    pub async fn outline(&self, user: &UserRecord, topic: &str) -> Result<Vec<String>, AssistError> {
        self.check(user, topic)?;
        let sections = self.provider.outline(topic).await?;
        self.record(user, "assist.outline").await?;
        Ok(sections)
    }

    pub async fn rewrite_tone(
        &self,
        user: &UserRecord,
        body_markdown: &str,
        tone: ToneTarget,
    ) -> Result<String, AssistError> {
        self.check(user, body_markdown)?;
        let rewritten = self.provider.rewrite_tone(body_markdown, tone).await?;
        self.record(user, "assist.tone").await?;
        Ok(rewritten)
    }

    pub async fn cover_prompt(
        &self,
        user: &UserRecord,
        title: &str,
        excerpt: &str,
    ) -> Result<String, AssistError> {
        self.check(user, title)?;
        let prompt = self.provider.cover_prompt(title, excerpt).await?;
        self.record(user, "assist.cover").await?;
        Ok(prompt)
    }

    fn check(&self, user: &UserRecord, input: &str) -> Result<(), AssistError> {
        if !user.role.can_author() || user.suspended {
            return Err(AssistError::Forbidden("assist is for authors"));
        }
        if input.trim().is_empty() {
            return Err(AssistError::Invalid("input is empty"));
        }
        if input.len() > MAX_ASSIST_INPUT {
            return Err(AssistError::Invalid("input is too long"));
        }
        Ok(())
    }

    // Only the fact that assistance was used is recorded, never the content.
    async fn record(&self, user: &UserRecord, action: &str) -> Result<(), RepoError> {
        self.audit
            .record(
                &format!("user:{}", user.id),
                action,
                "assist",
                None,
                Option::<&()>::None,
            )
            .await
    }
}
