use std::fmt;
use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName};
use chrono::{TimeDelta, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::services::auth::bearer::retrieve_token;
use crate::services::auth::claims::{Claims, RESERVED_CLAIMS, TokenData, TokenUser};
use crate::services::auth::codec::TokenCodec;
use crate::services::auth::error::AuthError;
use crate::services::identity::{IdentityStore, Subject, SubjectRef, resolve_subject};
use crate::services::session::SessionStore;

pub const DEFAULT_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
pub const DEFAULT_FALLBACK_HEADER: &str = "x-forwarded-authorization";

/// Extension point for the claims of newly issued tokens.
///
/// `token_claims` edits the top-level extra claims, `token_data` the entries
/// placed next to `user` inside `data`. Reserved names are dropped after the
/// hooks ran.
pub trait ClaimsHook: Send + Sync {
    fn token_claims(&self, _claims: &mut Map<String, Value>) {}

    fn token_data(&self, _data: &mut Map<String, Value>, _subject: &Subject) {}
}

/// A freshly signed token plus a display-safe summary of its subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub user_email: String,
    pub user_nicename: String,
    pub user_display_name: String,
}

/// Issues, validates and revokes session-bound JWTs.
#[derive(Clone)]
pub struct TokenIssuer {
    codec: TokenCodec,
    issuer: String,
    ttl: TimeDelta,
    fallback_header: HeaderName,
    identities: Arc<dyn IdentityStore>,
    sessions: Arc<dyn SessionStore>,
    hooks: Vec<Arc<dyn ClaimsHook>>,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("codec", &self.codec)
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .field("fallback_header", &self.fallback_header)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl TokenIssuer {
    /// `issuer` is the canonical site origin; a trailing `/` is ignored.
    pub fn new(
        codec: TokenCodec,
        issuer: &str,
        identities: Arc<dyn IdentityStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            codec,
            issuer: issuer.trim_end_matches('/').to_string(),
            ttl: TimeDelta::seconds(DEFAULT_TTL_SECONDS),
            fallback_header: HeaderName::from_static(DEFAULT_FALLBACK_HEADER),
            identities,
            sessions,
            hooks: Vec::new(),
        }
    }

    pub fn with_ttl(mut self, ttl: TimeDelta) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_fallback_header(mut self, header: HeaderName) -> Self {
        self.fallback_header = header;
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn ClaimsHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn identities(&self) -> &Arc<dyn IdentityStore> {
        &self.identities
    }

    /// Verify credentials with the identity store, then issue for that user.
    pub async fn issue_by_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<IssuedToken, AuthError> {
        let subject = self
            .identities
            .authenticate(username, password)
            .await
            .map_err(|e| {
                warn!(username, error = %e, "credential check failed");
                AuthError::from(e)
            })?;

        self.issue_for(subject).await
    }

    /// Issue a token for an id, email, login name or already-resolved user.
    pub async fn issue_for(&self, subject: impl Into<SubjectRef>) -> Result<IssuedToken, AuthError> {
        let subject = resolve_subject(self.identities.as_ref(), subject.into())
            .await?
            .ok_or_else(|| {
                AuthError::UnresolvableSubject("User could not be resolved".to_string())
            })?;

        let now = Utc::now();
        let expires_at = now + self.ttl;

        let jti = self.sessions.create(subject.id, expires_at).await.map_err(|e| {
            error!(user_id = %subject.id, error = %e, "failed to create session");
            AuthError::from(e)
        })?;

        let mut extra = Map::new();
        let mut data_extra = Map::new();
        for hook in &self.hooks {
            hook.token_claims(&mut extra);
            hook.token_data(&mut data_extra, &subject);
        }
        strip_reserved(&mut extra, RESERVED_CLAIMS);
        strip_reserved(&mut data_extra, &["user"]);

        let claims = Claims {
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expires_at.timestamp(),
            jti,
            data: TokenData {
                user: TokenUser {
                    id: Some(subject.id),
                },
                extra: data_extra,
            },
            extra,
        };

        let token = match self.codec.encode(&claims) {
            Ok(token) => token,
            Err(e) => {
                // 署名できなかった token の session は残さない
                if let Err(destroy) = self.sessions.destroy(subject.id, &claims.jti).await {
                    warn!(user_id = %subject.id, error = %destroy, "failed to drop unsigned session");
                }
                return Err(AuthError::Store(e.to_string()));
            }
        };

        info!(user_id = %subject.id, exp = claims.exp, "token issued");

        Ok(IssuedToken {
            token,
            user_email: subject.email,
            user_nicename: subject.nice_name,
            user_display_name: subject.display_name,
        })
    }

    /// Validate `token`, or the bearer token from `headers` when `None`.
    pub async fn validate(
        &self,
        token: Option<&str>,
        headers: &HeaderMap,
    ) -> Result<Claims, AuthError> {
        match token {
            Some(token) => self.validate_token(token).await,
            None => self.validate_token(&self.retrieve_token(headers)?).await,
        }
    }

    pub fn retrieve_token(&self, headers: &HeaderMap) -> Result<String, AuthError> {
        retrieve_token(headers, &self.fallback_header)
    }

    pub async fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.authenticate_token(token).await.map(|(claims, _)| claims)
    }

    /// Full validation, returning the subject the token still refers to.
    pub(crate) async fn authenticate_token(
        &self,
        token: &str,
    ) -> Result<(Claims, Subject), AuthError> {
        let claims = self
            .codec
            .decode(token)
            .map_err(|e| AuthError::TokenInvalid(e.to_string()))?;

        if claims.iss != self.issuer {
            debug!(iss = %claims.iss, expected = %self.issuer, "issuer mismatch");
            return Err(AuthError::TokenInvalid(
                "The issuer does not match".to_string(),
            ));
        }

        let user_id = claims.user_id().ok_or_else(|| {
            AuthError::TokenInvalid("User id was not found in the token".to_string())
        })?;

        let subject = self
            .identities
            .resolve_by_id(user_id)
            .await?
            .ok_or_else(|| {
                AuthError::UnresolvableSubject(format!("User id: {user_id} no longer available"))
            })?;

        if !self.sessions.verify(user_id, &claims.jti).await? {
            debug!(user_id = %user_id, "session missing or expired");
            return Err(AuthError::TokenStale);
        }

        Ok((claims, subject))
    }

    /// Revoke the session behind `token` (or the bearer token).
    ///
    /// Always reports success: a token that cannot be validated is already
    /// unusable.
    pub async fn invalidate(&self, token: Option<&str>, headers: &HeaderMap) -> bool {
        match self.try_invalidate(token, headers).await {
            Ok(user_id) => info!(user_id = %user_id, "token invalidated"),
            Err(e) => debug!(error = %e, "invalidate on an already unusable token"),
        }
        true
    }

    async fn try_invalidate(
        &self,
        token: Option<&str>,
        headers: &HeaderMap,
    ) -> Result<uuid::Uuid, AuthError> {
        let claims = self.validate(token, headers).await?;
        let user_id = claims.user_id().ok_or_else(|| {
            AuthError::TokenInvalid("User id was not found in the token".to_string())
        })?;
        self.sessions.destroy(user_id, &claims.jti).await?;
        Ok(user_id)
    }
}

fn strip_reserved(map: &mut Map<String, Value>, reserved: &[&str]) {
    for name in reserved {
        if map.remove(*name).is_some() {
            warn!(claim = *name, "claim hook tried to override a reserved claim; ignored");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    use crate::services::auth::codec::SigningAlgorithm;
    use crate::services::identity::InMemoryIdentityStore;
    use crate::services::session::InMemorySessionStore;

    const SITE: &str = "https://example.com";

    fn alice() -> Subject {
        Subject {
            id: uuid::Uuid::new_v4(),
            login: "alice".into(),
            email: "alice@example.com".into(),
            display_name: "Alice Liddell".into(),
            nice_name: "alice".into(),
            roles: ["editor".to_string()].into(),
            capabilities: Default::default(),
        }
    }

    fn codec(secret: &str) -> TokenCodec {
        TokenCodec::new(SigningAlgorithm::HS256, secret, None).unwrap()
    }

    struct Fixture {
        issuer: TokenIssuer,
        identities: Arc<InMemoryIdentityStore>,
        sessions: Arc<InMemorySessionStore>,
        user: Subject,
    }

    async fn fixture() -> Fixture {
        let identities = Arc::new(InMemoryIdentityStore::new());
        let sessions = Arc::new(InMemorySessionStore::new());
        let user = alice();
        identities.insert(user.clone(), "wonderland").await;

        let issuer = TokenIssuer::new(
            codec("secret"),
            &format!("{SITE}/"),
            identities.clone(),
            sessions.clone(),
        );

        Fixture {
            issuer,
            identities,
            sessions,
            user,
        }
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        h
    }

    #[tokio::test]
    async fn issue_then_validate() {
        let f = fixture().await;
        let issued = f.issuer.issue_for(f.user.id).await.unwrap();

        assert_eq!(issued.user_email, "alice@example.com");
        assert_eq!(issued.user_nicename, "alice");
        assert_eq!(issued.user_display_name, "Alice Liddell");

        let claims = f.issuer.validate_token(&issued.token).await.unwrap();
        assert_eq!(claims.user_id(), Some(f.user.id));
        assert_eq!(claims.iss, SITE);
        assert_eq!(claims.iat, claims.nbf);
        assert_eq!(claims.exp - claims.iat, DEFAULT_TTL_SECONDS);
        assert_eq!(f.sessions.len().await, 1);
    }

    #[tokio::test]
    async fn issue_by_email_login_and_credentials() {
        let f = fixture().await;
        assert!(f.issuer.issue_for("alice@example.com").await.is_ok());
        assert!(f.issuer.issue_for("alice").await.is_ok());
        assert!(f.issuer.issue_for(f.user.clone()).await.is_ok());
        assert!(
            f.issuer
                .issue_by_credentials("alice", "wonderland")
                .await
                .is_ok()
        );

        assert!(matches!(
            f.issuer.issue_by_credentials("alice", "nope").await,
            Err(AuthError::AuthenticationFailed)
        ));
        assert!(matches!(
            f.issuer.issue_for("nobody").await,
            Err(AuthError::UnresolvableSubject(_))
        ));
        assert_eq!(f.sessions.len().await, 4);
    }

    #[tokio::test]
    async fn invalidate_makes_token_stale() {
        let f = fixture().await;
        let issued = f.issuer.issue_for(f.user.id).await.unwrap();

        assert!(f.issuer.invalidate(Some(&issued.token), &HeaderMap::new()).await);
        assert!(matches!(
            f.issuer.validate_token(&issued.token).await,
            Err(AuthError::TokenStale)
        ));
        // Idempotent: a second call on the stale token still succeeds.
        assert!(f.issuer.invalidate(Some(&issued.token), &HeaderMap::new()).await);
        assert!(f.issuer.invalidate(None, &HeaderMap::new()).await);
        assert!(f.issuer.invalidate(Some("garbage"), &HeaderMap::new()).await);
    }

    #[tokio::test]
    async fn validate_and_invalidate_read_the_bearer_header() {
        let f = fixture().await;
        let issued = f.issuer.issue_for(f.user.id).await.unwrap();
        let headers = bearer(&issued.token);

        assert!(f.issuer.validate(None, &headers).await.is_ok());
        assert!(matches!(
            f.issuer.validate(None, &HeaderMap::new()).await,
            Err(AuthError::MissingAuthorizationHeader(_))
        ));

        assert!(f.issuer.invalidate(None, &headers).await);
        assert!(matches!(
            f.issuer.validate(None, &headers).await,
            Err(AuthError::TokenStale)
        ));
    }

    #[tokio::test]
    async fn foreign_secret_is_token_invalid() {
        let f = fixture().await;
        let forger = TokenIssuer::new(
            codec("another-secret"),
            SITE,
            f.identities.clone(),
            f.sessions.clone(),
        );
        let forged = forger.issue_for(f.user.id).await.unwrap();

        assert!(matches!(
            f.issuer.validate_token(&forged.token).await,
            Err(AuthError::TokenInvalid(_))
        ));
        assert!(matches!(
            f.issuer.validate_token("not-a-token").await,
            Err(AuthError::TokenInvalid(_))
        ));
    }

    #[tokio::test]
    async fn issuer_mismatch_is_token_invalid() {
        let f = fixture().await;
        let other_site = TokenIssuer::new(
            codec("secret"),
            "https://elsewhere.example",
            f.identities.clone(),
            f.sessions.clone(),
        );
        let token = other_site.issue_for(f.user.id).await.unwrap().token;

        let err = f.issuer.validate_token(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid(ref m) if m == "The issuer does not match"));
    }

    #[tokio::test]
    async fn missing_user_id_is_token_invalid() {
        let f = fixture().await;
        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: SITE.into(),
            iat: now,
            nbf: now,
            exp: now + 60,
            jti: "whatever".into(),
            data: TokenData::default(),
            extra: Map::new(),
        };
        let token = codec("secret").encode(&claims).unwrap();

        assert!(matches!(
            f.issuer.validate_token(&token).await,
            Err(AuthError::TokenInvalid(ref m)) if m == "User id was not found in the token"
        ));
    }

    #[tokio::test]
    async fn deleted_user_is_unresolvable() {
        let f = fixture().await;
        let issued = f.issuer.issue_for(f.user.id).await.unwrap();
        f.identities.remove(f.user.id).await;

        assert!(matches!(
            f.issuer.validate_token(&issued.token).await,
            Err(AuthError::UnresolvableSubject(_))
        ));
    }

    #[tokio::test]
    async fn expired_token_is_token_invalid() {
        let f = fixture().await;
        let issuer = f.issuer.clone().with_ttl(TimeDelta::seconds(-60));
        let issued = issuer.issue_for(f.user.id).await.unwrap();

        assert!(matches!(
            f.issuer.validate_token(&issued.token).await,
            Err(AuthError::TokenInvalid(_))
        ));
    }

    #[tokio::test]
    async fn signing_failure_leaves_no_session_behind() {
        let f = fixture().await;
        let issuer = TokenIssuer::new(
            TokenCodec::unable_to_sign(),
            SITE,
            f.identities.clone(),
            f.sessions.clone(),
        );

        assert!(matches!(
            issuer.issue_for(f.user.id).await,
            Err(AuthError::Store(_))
        ));
        assert_eq!(f.sessions.len().await, 0);
    }

    #[tokio::test]
    async fn stale_resolved_subject_is_not_issued() {
        let f = fixture().await;
        f.identities.remove(f.user.id).await;

        assert!(matches!(
            f.issuer.issue_for(f.user.clone()).await,
            Err(AuthError::UnresolvableSubject(_))
        ));
        assert_eq!(f.sessions.len().await, 0);
    }

    struct SiteHook;

    impl ClaimsHook for SiteHook {
        fn token_claims(&self, claims: &mut Map<String, Value>) {
            claims.insert("aud".into(), json!("mobile"));
            claims.insert("iss".into(), json!("https://evil.example"));
        }

        fn token_data(&self, data: &mut Map<String, Value>, subject: &Subject) {
            data.insert("roles".into(), json!(subject.roles));
            data.insert("user".into(), json!({ "id": "hijacked" }));
        }
    }

    #[tokio::test]
    async fn hooks_extend_claims_but_not_reserved_ones() {
        let f = fixture().await;
        let issuer = f.issuer.clone().with_hook(Arc::new(SiteHook));
        let issued = issuer.issue_for(f.user.id).await.unwrap();

        let claims = f.issuer.validate_token(&issued.token).await.unwrap();
        assert_eq!(claims.iss, SITE);
        assert_eq!(claims.extra.get("aud"), Some(&json!("mobile")));
        assert_eq!(claims.data.extra.get("roles"), Some(&json!(["editor"])));
        assert_eq!(claims.user_id(), Some(f.user.id));
    }
}
