use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::application::repos::{RepoError, UpsertUserParams, UsersRepo};
use crate::domain::entities::UserRecord;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("token rejected")]
    InvalidToken,
    #[error("account suspended")]
    Suspended,
    #[error("identity provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Claims returned by the hosted identity provider for a valid token.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityClaims {
    pub subject: String,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Verifies bearer tokens against the hosted identity provider.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<IdentityClaims, IdentityError>;
}

/// Account events pushed by the identity provider's webhook.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IdentityEvent {
    UserUpserted {
        subject: String,
        email: String,
        display_name: String,
        #[serde(default)]
        avatar_url: Option<String>,
    },
    UserDeleted {
        subject: String,
    },
}

#[derive(Clone)]
pub struct IdentityService {
    verifier: Arc<dyn TokenVerifier>,
    users: Arc<dyn UsersRepo>,
}

impl IdentityService {
    pub fn new(verifier: Arc<dyn TokenVerifier>, users: Arc<dyn UsersRepo>) -> Self {
        Self { verifier, users }
    }

    /// Resolve a bearer token to a local user, provisioning the profile on
    /// first sight so a webhook race never locks a valid account out.
    pub async fn authenticate(&self, token: &str) -> Result<UserRecord, IdentityError> {
        let claims = self.verifier.verify(token).await?;

        let user = match self.users.find_by_subject(&claims.subject).await? {
            Some(user) => user,
            None => {
                self.users
                    .upsert_by_subject(UpsertUserParams {
                        subject: claims.subject,
                        email: claims.email,
                        display_name: claims.display_name,
                        avatar_url: claims.avatar_url,
                    })
                    .await?
            }
        };

        if user.suspended {
            return Err(IdentityError::Suspended);
        }

        Ok(user)
    }
}
