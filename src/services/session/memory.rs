use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::store::{SessionError, SessionRecord, SessionStore};
use super::token::{generate_token_id, hash_token_id};

type SessionKey = (Uuid, Vec<u8>);

/// Process-local session store. Lost on restart.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionKey, SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(
        &self,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<String, SessionError> {
        let token_id = generate_token_id()?;
        let key = (user_id, hash_token_id(&token_id));

        let mut sessions = self.sessions.write().await;
        // Expired records are dropped opportunistically on write.
        let now = Utc::now();
        sessions.retain(|_, record| record.is_live(now));
        sessions.insert(key, SessionRecord::new_jwt(user_id, expires_at));

        Ok(token_id)
    }

    async fn verify(&self, user_id: Uuid, token_id: &str) -> Result<bool, SessionError> {
        let key = (user_id, hash_token_id(token_id));
        Ok(self
            .sessions
            .read()
            .await
            .get(&key)
            .is_some_and(|record| record.is_live(Utc::now())))
    }

    async fn destroy(&self, user_id: Uuid, token_id: &str) -> Result<(), SessionError> {
        let key = (user_id, hash_token_id(token_id));
        self.sessions.write().await.remove(&key);
        Ok(())
    }
}
