use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::store::{IdentityError, IdentityStore, Subject};

struct UserEntry {
    subject: Subject,
    password: String,
}

/// Process-local identity store for tests and local development.
///
/// Passwords are compared verbatim; production deployments use the Postgres
/// store, which delegates verification to the database.
#[derive(Default)]
pub struct InMemoryIdentityStore {
    users: RwLock<HashMap<Uuid, UserEntry>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, subject: Subject, password: impl Into<String>) {
        let entry = UserEntry {
            subject,
            password: password.into(),
        };
        self.users.write().await.insert(entry.subject.id, entry);
    }

    pub async fn remove(&self, id: Uuid) -> Option<Subject> {
        self.users.write().await.remove(&id).map(|e| e.subject)
    }

    async fn find<F>(&self, pred: F) -> Option<Subject>
    where
        F: Fn(&Subject) -> bool,
    {
        self.users
            .read()
            .await
            .values()
            .find(|e| pred(&e.subject))
            .map(|e| e.subject.clone())
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn resolve_by_id(&self, id: Uuid) -> Result<Option<Subject>, IdentityError> {
        Ok(self.users.read().await.get(&id).map(|e| e.subject.clone()))
    }

    async fn resolve_by_email(&self, email: &str) -> Result<Option<Subject>, IdentityError> {
        Ok(self.find(|s| s.email.eq_ignore_ascii_case(email)).await)
    }

    async fn resolve_by_login(&self, login: &str) -> Result<Option<Subject>, IdentityError> {
        Ok(self.find(|s| s.login == login).await)
    }

    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Subject, IdentityError> {
        let users = self.users.read().await;
        users
            .values()
            .find(|e| {
                (e.subject.login == username || e.subject.email.eq_ignore_ascii_case(username))
                    && e.password == password
            })
            .map(|e| e.subject.clone())
            .ok_or(IdentityError::InvalidCredentials)
    }
}
