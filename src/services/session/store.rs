use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session backend error: {0}")]
    Backend(String),
    #[error("failed to gather entropy for session token: {0}")]
    Entropy(String),
}

/// One issued, revocable token for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Set for sessions minted by the token issuer.
    #[serde(default)]
    pub jwt: bool,
}

impl SessionRecord {
    pub fn new_jwt(user_id: Uuid, expires_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            expires_at,
            created_at: Utc::now(),
            jwt: true,
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at >= now
    }
}

/// Contract of the external session store.
///
/// `create` hands back the raw token id; implementations persist only its
/// hash (see [`super::token::hash_token_id`]).
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, user_id: Uuid, expires_at: DateTime<Utc>)
    -> Result<String, SessionError>;

    /// True when a live session exists for `(user_id, token_id)`.
    async fn verify(&self, user_id: Uuid, token_id: &str) -> Result<bool, SessionError>;

    /// Destroying an unknown session is not an error.
    async fn destroy(&self, user_id: Uuid, token_id: &str) -> Result<(), SessionError>;
}
