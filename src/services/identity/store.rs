use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A user as known by the identity store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: Uuid,
    pub login: String,
    pub email: String,
    pub display_name: String,
    pub nice_name: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
}

impl Subject {
    /// True when the subject holds at least one of `roles`.
    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().any(|r| self.roles.contains(r.as_ref()))
    }

    /// Capability check.
    ///
    /// Without arguments the capability must be granted as-is. With
    /// arguments (e.g. an object id) either the bare capability or a
    /// `capability:arg` grant for every argument satisfies the check.
    pub fn can<S: AsRef<str>>(&self, capability: &str, args: &[S]) -> bool {
        if self.capabilities.contains(capability) {
            return true;
        }
        !args.is_empty()
            && args.iter().all(|arg| {
                self.capabilities
                    .contains(&format!("{capability}:{}", arg.as_ref()))
            })
    }
}

/// Anything that may carry an authenticated subject (a request, a test payload).
pub trait Principal {
    fn principal(&self) -> Option<&Subject>;
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("identity backend error: {0}")]
    Backend(String),
}

/// Contract of the external user store.
///
/// Password verification lives entirely behind `authenticate`.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn resolve_by_id(&self, id: Uuid) -> Result<Option<Subject>, IdentityError>;

    async fn resolve_by_email(&self, email: &str) -> Result<Option<Subject>, IdentityError>;

    async fn resolve_by_login(&self, login: &str) -> Result<Option<Subject>, IdentityError>;

    /// Verify credentials; `username` may be a login name or an email.
    async fn authenticate(&self, username: &str, password: &str)
    -> Result<Subject, IdentityError>;
}

/// The loosely-typed subject reference accepted when issuing a token.
#[derive(Debug, Clone)]
pub enum SubjectRef {
    Id(Uuid),
    /// Email address or login name (or a textual id).
    Name(String),
    Resolved(Subject),
}

impl From<Uuid> for SubjectRef {
    fn from(id: Uuid) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for SubjectRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for SubjectRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<Subject> for SubjectRef {
    fn from(subject: Subject) -> Self {
        Self::Resolved(subject)
    }
}

/// Resolve a subject reference: identity first, then email, then login.
///
/// An already-resolved subject is looked up again by id, so a user removed
/// from the store in the meantime resolves to `None`.
pub async fn resolve_subject(
    store: &dyn IdentityStore,
    subject: SubjectRef,
) -> Result<Option<Subject>, IdentityError> {
    match subject {
        SubjectRef::Resolved(s) => store.resolve_by_id(s.id).await,
        SubjectRef::Id(id) => store.resolve_by_id(id).await,
        SubjectRef::Name(name) => {
            let name = name.trim();

            if let Ok(id) = Uuid::parse_str(name) {
                if let Some(found) = store.resolve_by_id(id).await? {
                    return Ok(Some(found));
                }
            }

            if looks_like_email(name) {
                if let Some(found) = store.resolve_by_email(name).await? {
                    return Ok(Some(found));
                }
            }

            store.resolve_by_login(name).await
        }
    }
}

/// Loose email shape check: `local@domain.tld`, no whitespace.
pub fn looks_like_email(s: &str) -> bool {
    if s.len() < 6 || s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
