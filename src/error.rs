/*
 * Responsibility
 * - アプリ共通の AppError / Rejection 定義
 * - IntoResponse 実装 (HTTP status / JSON error body)
 * - AuthError / RepoError を統一的に変換
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::repos::error::RepoError;
use crate::services::auth::AuthError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

fn error_response(status: StatusCode, code: &'static str, message: String) -> Response {
    let body = ErrorResponse {
        error: ErrorBody { code, message },
    };

    (status, Json(body)).into_response()
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{code}: {message}")]
    BadRequest { code: &'static str, message: String },
    #[error("not found: {resource}")]
    NotFound { resource: &'static str },
    #[error("unauthorized")]
    Unauthorized,
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &'static str) -> Self {
        Self::NotFound { resource }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            AppError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("{resource} not found."),
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "rest_not_logged_in",
                "You are not currently logged in.".into(),
            ),
            AppError::Auth(e) => match e {
                // backend の詳細はクライアントに返さない
                AuthError::Store(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    e.error_code(),
                    "internal server error".into(),
                ),
                other => (other.status_code(), other.error_code(), other.to_string()),
            },
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                "internal server error".into(),
            ),
        };

        error_response(status, code, message)
    }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Db(_) => AppError::Internal,
        }
    }
}

/// Structured refusal produced by the route guard, before the handler runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl Rejection {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// Identity resolution failed on a guarded route.
    ///
    /// Only `TokenInvalid` and `Unauthorized` keep their own status; every
    /// other failure is reported as a token error.
    pub fn from_guard_error(e: &AuthError) -> Self {
        match e {
            AuthError::TokenInvalid(_) => {
                Self::new(StatusCode::FORBIDDEN, "jwt_token_invalid", e.to_string())
            }
            AuthError::Unauthorized(_) => Self::new(
                StatusCode::UNAUTHORIZED,
                "jwt_user_not_authorised",
                e.to_string(),
            ),
            AuthError::Store(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "jwt_token_error",
                "internal server error",
            ),
            other => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "jwt_token_error",
                other.to_string(),
            ),
        }
    }

    /// A middleware step refused the request.
    pub fn not_allowed(authenticated: bool) -> Self {
        let status = if authenticated {
            StatusCode::FORBIDDEN
        } else {
            StatusCode::UNAUTHORIZED
        };
        Self::new(
            status,
            "rest_authorization",
            "Sorry, You are not allowed to do that",
        )
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        error_response(self.status, self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(resp: Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn guard_error_mapping() {
        let invalid = Rejection::from_guard_error(&AuthError::TokenInvalid("Expired token".into()));
        assert_eq!(invalid.status, StatusCode::FORBIDDEN);
        assert_eq!(invalid.code, "jwt_token_invalid");
        assert_eq!(invalid.message, "Expired token");

        let denied = Rejection::from_guard_error(&AuthError::Unauthorized("nope".into()));
        assert_eq!(denied.status, StatusCode::UNAUTHORIZED);
        assert_eq!(denied.code, "jwt_user_not_authorised");

        for other in [
            AuthError::TokenStale,
            AuthError::MissingAuthorizationHeader("Authorization header is missing."),
            AuthError::UnresolvableSubject("gone".into()),
        ] {
            let r = Rejection::from_guard_error(&other);
            assert_eq!(r.status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(r.code, "jwt_token_error");
        }
    }

    #[test]
    fn not_allowed_depends_on_identity() {
        assert_eq!(Rejection::not_allowed(false).status, StatusCode::UNAUTHORIZED);
        assert_eq!(Rejection::not_allowed(true).status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn rejection_body_shape() {
        let resp = Rejection::not_allowed(true).into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["code"], "rest_authorization");
        assert_eq!(body["error"]["message"], "Sorry, You are not allowed to do that");
    }

    #[tokio::test]
    async fn auth_errors_keep_their_status_but_hide_backend_details() {
        let resp = AppError::from(AuthError::TokenStale).into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(resp).await["error"]["code"], "jwt_token_stale");

        let resp = AppError::from(AuthError::Store("connection refused".into())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["message"], "internal server error");
    }
}
