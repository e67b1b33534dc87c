/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 * - Config + store から AuthService を組み立てる (起動時に一度だけ)
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;

use thiserror::Error;

use crate::config::Config;
use crate::services::auth::{AuthService, CodecError, GuardedRequest, TokenCodec, TokenIssuer};
use crate::services::identity::IdentityStore;
use crate::services::routing::{RegistryError, RouteGuards, RouteGuardsBuilder};
use crate::services::session::SessionStore;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("signing configuration: {0}")]
    Codec(#[from] CodecError),
    #[error("route guards: {0}")]
    Registry(#[from] RegistryError),
}

#[derive(Clone, Debug)]
pub struct AppState {
    pub auth: AuthService,
}

impl AppState {
    pub fn new(auth: AuthService) -> Self {
        Self { auth }
    }

    pub fn from_config(
        config: &Config,
        identities: Arc<dyn IdentityStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self, StateError> {
        Self::with_guards(config, identities, sessions, RouteGuards::builder())
    }

    /// Like [`AppState::from_config`], starting from a builder that may
    /// already carry named handlers or extra bindings.
    pub fn with_guards(
        config: &Config,
        identities: Arc<dyn IdentityStore>,
        sessions: Arc<dyn SessionStore>,
        builder: RouteGuardsBuilder<GuardedRequest>,
    ) -> Result<Self, StateError> {
        let codec = TokenCodec::new(
            config.jwt_algorithm,
            &config.jwt_secret,
            config.jwt_public_key_pem.as_deref(),
        )?
        .with_leeway(config.jwt_leeway_seconds);

        let issuer = TokenIssuer::new(codec, &config.site_url, identities, sessions)
            .with_ttl(config.jwt_ttl)
            .with_fallback_header(config.auth_fallback_header.clone());

        // logout は bearer token の identity が前提なので常に guard 対象
        let mut builder = builder
            .guard(&config.guard_patterns)
            .guard([format!("{}/logout", config.auth_prefix())])
            .ignore(&config.ignore_patterns);
        for (pattern, steps) in &config.middleware_bindings {
            builder = builder.middleware(pattern, steps.iter().map(String::as_str));
        }

        Ok(Self::new(AuthService::new(Arc::new(issuer), builder.build()?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::identity::InMemoryIdentityStore;
    use crate::services::session::InMemorySessionStore;

    fn config(extra: &[(&str, &str)]) -> Config {
        let mut pairs = vec![("SITE_URL", "https://example.com"), ("JWT_SECRET", "s3cret")];
        pairs.extend_from_slice(extra);
        Config::from_lookup(|key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        })
        .unwrap()
    }

    fn build(config: &Config) -> Result<AppState, StateError> {
        AppState::from_config(
            config,
            Arc::new(InMemoryIdentityStore::new()),
            Arc::new(InMemorySessionStore::new()),
        )
    }

    #[test]
    fn logout_route_is_always_guarded() {
        let state = build(&config(&[])).unwrap();
        let guards = state.auth.guards();
        assert!(guards.should_be_guarded("/jwt/v1/auth/logout"));
        assert!(!guards.should_be_guarded("/jwt/v1/auth/login"));
    }

    #[test]
    fn configured_patterns_and_bindings_are_registered() {
        let state = build(&config(&[
            ("JWT_GUARD", "wp/v2/*"),
            ("JWT_IGNORE", "wp/v2/public/*"),
            ("JWT_MIDDLEWARE", "wp/v2/posts=role:editor|can:edit_posts"),
        ]))
        .unwrap();
        let guards = state.auth.guards();

        assert!(guards.should_be_guarded("/wp/v2/posts"));
        assert!(guards.should_be_ignored("/wp/v2/public/feed"));
        assert_eq!(guards.middlewares_for("/wp/v2/posts").len(), 2);
    }

    #[test]
    fn unknown_middleware_name_fails_at_startup() {
        let err = build(&config(&[("JWT_MIDDLEWARE", "wp/v2/*=throttle:5")])).unwrap_err();
        assert!(matches!(
            err,
            StateError::Registry(RegistryError::UnknownMiddleware(_))
        ));
    }
}
