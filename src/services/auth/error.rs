use axum::http::StatusCode;
use thiserror::Error;

use crate::services::identity::IdentityError;
use crate::services::session::SessionError;

/// Failures of token retrieval, issuance and validation.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    MissingAuthorizationHeader(&'static str),

    #[error("{0}")]
    TokenInvalid(String),

    #[error("{0}")]
    UnresolvableSubject(String),

    #[error("Token can no longer be used")]
    TokenStale,

    #[error("{0}")]
    Unauthorized(String),

    #[error("The username or password you entered is incorrect")]
    AuthenticationFailed,

    #[error("authentication backend error: {0}")]
    Store(String),
}

impl AuthError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthorizationHeader(_) => "jwt_missing_authorization_header",
            AuthError::TokenInvalid(_) => "jwt_token_invalid",
            AuthError::UnresolvableSubject(_) => "jwt_unresolvable_user",
            AuthError::TokenStale => "jwt_token_stale",
            AuthError::Unauthorized(_) => "jwt_user_not_authorised",
            AuthError::AuthenticationFailed => "jwt_authentication_failed",
            AuthError::Store(_) => "jwt_backend_error",
        }
    }

    /// Status used when the error answers a request to one of the auth endpoints.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthorizationHeader(_) | AuthError::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::TokenInvalid(_)
            | AuthError::UnresolvableSubject(_)
            | AuthError::TokenStale
            | AuthError::AuthenticationFailed => StatusCode::FORBIDDEN,
            AuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<IdentityError> for AuthError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::InvalidCredentials => AuthError::AuthenticationFailed,
            IdentityError::Backend(msg) => AuthError::Store(msg),
        }
    }
}

impl From<SessionError> for AuthError {
    fn from(e: SessionError) -> Self {
        AuthError::Store(e.to_string())
    }
}
