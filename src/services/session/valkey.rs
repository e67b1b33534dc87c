//! Valkey-backed session store (Redis protocol).
//!
//! Each session is one key, `{prefix}:{user_id}:{hex(sha256(token_id))}`,
//! holding the JSON `SessionRecord` and expiring with the session itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error};
use uuid::Uuid;

use super::store::{SessionError, SessionRecord, SessionStore};
use super::token::{generate_token_id, hash_token_id};

#[derive(Clone)]
pub struct ValkeySessionStore {
    manager: redis::aio::ConnectionManager,
    prefix: String,
}

impl std::fmt::Debug for ValkeySessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValkeySessionStore")
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl ValkeySessionStore {
    /// Connect to a URL like `redis://localhost:6379`.
    pub async fn connect(url: &str) -> Result<Self, SessionError> {
        Self::connect_with_prefix(url, "jwt:session").await
    }

    pub async fn connect_with_prefix(
        url: &str,
        prefix: impl Into<String>,
    ) -> Result<Self, SessionError> {
        let client = redis::Client::open(url).map_err(backend)?;
        let manager = client.get_connection_manager().await.map_err(backend)?;

        Ok(Self {
            manager,
            prefix: prefix.into(),
        })
    }

    fn key(&self, user_id: Uuid, token_id: &str) -> String {
        format!(
            "{}:{}:{}",
            self.prefix,
            user_id,
            hex::encode(hash_token_id(token_id))
        )
    }
}

fn backend(e: redis::RedisError) -> SessionError {
    SessionError::Backend(e.to_string())
}

#[async_trait]
impl SessionStore for ValkeySessionStore {
    async fn create(
        &self,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<String, SessionError> {
        let token_id = generate_token_id()?;
        let key = self.key(user_id, &token_id);

        let record = SessionRecord::new_jwt(user_id, expires_at);
        let value =
            serde_json::to_string(&record).map_err(|e| SessionError::Backend(e.to_string()))?;

        // EX takes whole seconds; clamp to at least one.
        let ttl_seconds = (expires_at - Utc::now()).num_seconds().max(1);

        let mut conn = self.manager.clone();
        // SET key value NX EX ttl -> `OK` when stored, nil when the key exists.
        let stored: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!(user_id = %user_id, error = %e, "failed to store session");
                backend(e)
            })?;

        if stored.is_none() {
            return Err(SessionError::Backend("session key collision".into()));
        }

        debug!(user_id = %user_id, ttl_seconds, "session created");
        Ok(token_id)
    }

    async fn verify(&self, user_id: Uuid, token_id: &str) -> Result<bool, SessionError> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(self.key(user_id, token_id))
            .query_async(&mut conn)
            .await
            .map_err(backend)?;

        let Some(raw) = raw else {
            return Ok(false);
        };

        let record: SessionRecord =
            serde_json::from_str(&raw).map_err(|e| SessionError::Backend(e.to_string()))?;

        Ok(record.user_id == user_id && record.is_live(Utc::now()))
    }

    async fn destroy(&self, user_id: Uuid, token_id: &str) -> Result<(), SessionError> {
        let mut conn = self.manager.clone();
        let removed: u64 = redis::cmd("DEL")
            .arg(self.key(user_id, token_id))
            .query_async(&mut conn)
            .await
            .map_err(backend)?;

        debug!(user_id = %user_id, removed, "session destroyed");
        Ok(())
    }
}
