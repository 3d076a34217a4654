//! Client for the hosted identity provider.
//!
//! Tokens are verified against the provider's introspection endpoint and the
//! resulting claims are cached briefly so hot sessions do not hammer the
//! provider on every request.

use std::num::NonZeroUsize;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::application::identity::{IdentityClaims, IdentityError, TokenVerifier};

const DEFAULT_CACHE_CAPACITY: usize = 1024;

struct CachedClaims {
    claims: IdentityClaims,
    fresh_until: Instant,
}

pub struct ProviderTokenVerifier {
    client: Client,
    introspect_url: Url,
    api_key: String,
    cache_ttl: Duration,
    cache: RwLock<LruCache<[u8; 32], CachedClaims>>,
}

#[derive(Deserialize)]
struct IntrospectResponse {
    active: bool,
    #[serde(flatten)]
    claims: Option<IntrospectClaims>,
}

#[derive(Deserialize)]
struct IntrospectClaims {
    sub: String,
    email: String,
    name: String,
    #[serde(default)]
    picture: Option<String>,
}

impl ProviderTokenVerifier {
    pub fn new(
        base_url: &str,
        api_key: String,
        cache_ttl: Duration,
    ) -> Result<Self, super::error::InfraError> {
        let introspect_url = Url::parse(base_url)
            .and_then(|base| base.join("/v1/introspect"))
            .map_err(|err| super::error::InfraError::upstream("identity", err.to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .user_agent(concat!("foglio/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| super::error::InfraError::upstream("identity", err.to_string()))?;

        let capacity = NonZeroUsize::new(DEFAULT_CACHE_CAPACITY)
            .unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            client,
            introspect_url,
            api_key,
            cache_ttl,
            cache: RwLock::new(LruCache::new(capacity)),
        })
    }

    // Tokens are never stored verbatim, only their digest.
    fn cache_key(token: &str) -> [u8; 32] {
        Sha256::digest(token.as_bytes()).into()
    }

    fn cached(&self, key: &[u8; 32]) -> Option<IdentityClaims> {
        let mut cache = match self.cache.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match cache.get(key) {
            Some(entry) if entry.fresh_until > Instant::now() => {
                metrics::counter!("foglio_identity_cache_hit_total").increment(1);
                Some(entry.claims.clone())
            }
            Some(_) => {
                cache.pop(key);
                metrics::counter!("foglio_identity_cache_miss_total").increment(1);
                None
            }
            None => {
                metrics::counter!("foglio_identity_cache_miss_total").increment(1);
                None
            }
        }
    }

    fn store(&self, key: [u8; 32], claims: IdentityClaims) {
        let mut cache = match self.cache.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        cache.put(
            key,
            CachedClaims {
                claims,
                fresh_until: Instant::now() + self.cache_ttl,
            },
        );
    }
}

#[async_trait]
impl TokenVerifier for ProviderTokenVerifier {
    async fn verify(&self, token: &str) -> Result<IdentityClaims, IdentityError> {
        let key = Self::cache_key(token);
        if let Some(claims) = self.cached(&key) {
            return Ok(claims);
        }

        let response = self
            .client
            .post(self.introspect_url.clone())
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "token": token }))
            .send()
            .await
            .map_err(|err| IdentityError::ProviderUnavailable(err.to_string()))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(IdentityError::InvalidToken);
            }
            status => {
                return Err(IdentityError::ProviderUnavailable(format!(
                    "introspection returned {status}"
                )));
            }
        }

        let body: IntrospectResponse = response
            .json()
            .await
            .map_err(|err| IdentityError::ProviderUnavailable(err.to_string()))?;

        let claims = match (body.active, body.claims) {
            (true, Some(claims)) => IdentityClaims {
                subject: claims.sub,
                email: claims.email,
                display_name: claims.name,
                avatar_url: claims.picture,
            },
            _ => return Err(IdentityError::InvalidToken),
        };

        self.store(key, claims.clone());
        Ok(claims)
    }
}

/// Check a webhook body against its signature header.
///
/// The provider signs each delivery as `hex(sha256(secret || "." || body))`.
pub fn verify_webhook_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b".");
    hasher.update(body);
    let expected = hex::encode(hasher.finalize());

    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_signature_accepts_matching_digest() {
        let body = br#"{"type":"user_deleted","subject":"usr_1"}"#;
        let mut hasher = Sha256::new();
        hasher.update(b"whsec.");
        hasher.update(body);
        let signature = hex::encode(hasher.finalize());

        assert!(verify_webhook_signature("whsec", body, &signature));
    }

    #[test]
    fn webhook_signature_rejects_tampered_body() {
        let signature = {
            let mut hasher = Sha256::new();
            hasher.update(b"whsec.");
            hasher.update(b"original");
            hex::encode(hasher.finalize())
        };

        assert!(!verify_webhook_signature("whsec", b"tampered", &signature));
    }
}
