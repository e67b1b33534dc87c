//! Request-lifecycle orchestration: identity resolution, then the middleware
//! chain, then dispatch.
//!
//! Per-request state (the pending rejection, the resolved identity) travels
//! with the request as values; the service itself is immutable after startup.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use crate::api::v1::extractors::AuthCtx;
use crate::error::Rejection;
use crate::middleware::pipeline::{Outcome, Pipeline};
use crate::services::auth::issuer::TokenIssuer;
use crate::services::identity::Principal;
use crate::services::routing::RouteGuards;

pub type GuardedRequest = Request<Body>;

/// Result of the identity-resolution phase for one request.
#[derive(Debug)]
pub enum IdentityResolution {
    /// Ignored or unguarded path; no token was looked at.
    Anonymous,
    /// An earlier mechanism already established the identity.
    Established,
    Authenticated(Box<AuthCtx>),
    /// Resolution failed; answered before any middleware runs.
    Rejected(Rejection),
}

/// What to do with the request after the guard ran.
pub enum Dispatch {
    Proceed(GuardedRequest),
    Respond(Response),
}

#[derive(Clone)]
pub struct AuthService {
    issuer: Arc<TokenIssuer>,
    guards: Arc<RouteGuards<GuardedRequest>>,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("issuer", &self.issuer)
            .field("guards", &self.guards)
            .finish()
    }
}

impl AuthService {
    pub fn new(issuer: Arc<TokenIssuer>, guards: RouteGuards<GuardedRequest>) -> Self {
        Self {
            issuer,
            guards: Arc::new(guards),
        }
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn guards(&self) -> &RouteGuards<GuardedRequest> {
        &self.guards
    }

    /// Resolve the current identity from the bearer token when `path` is
    /// guarded and not ignored.
    ///
    /// Failures are returned as a [`Rejection`], never raised.
    pub async fn resolve_identity(
        &self,
        path: &str,
        headers: &HeaderMap,
        established: bool,
    ) -> IdentityResolution {
        if established {
            return IdentityResolution::Established;
        }
        if self.guards.should_be_ignored(path) || !self.guards.should_be_guarded(path) {
            return IdentityResolution::Anonymous;
        }

        let token = match self.issuer.retrieve_token(headers) {
            Ok(token) => token,
            Err(e) => {
                debug!(path, error = %e, "guarded route without usable bearer token");
                return IdentityResolution::Rejected(Rejection::from_guard_error(&e));
            }
        };

        match self.issuer.authenticate_token(&token).await {
            Ok((claims, subject)) => {
                debug!(path, user_id = %subject.id, "identity resolved from token");
                IdentityResolution::Authenticated(Box::new(AuthCtx::new(subject, claims)))
            }
            Err(e) => {
                warn!(path, error = %e, code = e.error_code(), "token rejected");
                IdentityResolution::Rejected(Rejection::from_guard_error(&e))
            }
        }
    }

    /// Run the middleware chain bound to `path`. Ignored paths skip it.
    pub async fn dispatch(&self, path: &str, req: GuardedRequest) -> Dispatch {
        if self.guards.should_be_ignored(path) {
            return Dispatch::Proceed(req);
        }

        let steps = self.guards.middlewares_for(path);
        if steps.is_empty() {
            return Dispatch::Proceed(req);
        }

        let authenticated = req.principal().is_some();
        match Pipeline::through(req, steps).await {
            Outcome::Continue(req) => Dispatch::Proceed(req),
            Outcome::Deny => {
                debug!(path, authenticated, "middleware denied request");
                Dispatch::Respond(Rejection::not_allowed(authenticated).into_response())
            }
            Outcome::Fail(rejection) => Dispatch::Respond(rejection.into_response()),
            Outcome::Respond(resp) => Dispatch::Respond(resp),
        }
    }

    /// Identity resolution followed by dispatch.
    ///
    /// A pending rejection answers the request before any middleware runs.
    pub async fn guard(&self, path: &str, mut req: GuardedRequest) -> Dispatch {
        let established = req.extensions().get::<AuthCtx>().is_some();

        match self.resolve_identity(path, req.headers(), established).await {
            IdentityResolution::Rejected(rejection) => {
                return Dispatch::Respond(rejection.into_response());
            }
            IdentityResolution::Authenticated(ctx) => {
                req.extensions_mut().insert(*ctx);
            }
            IdentityResolution::Anonymous | IdentityResolution::Established => {}
        }

        self.dispatch(path, req).await
    }
}
