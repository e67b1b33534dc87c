use axum::http::{HeaderMap, HeaderName, header};

use crate::services::auth::error::AuthError;

/// Pull the bearer token out of the request headers.
///
/// `Authorization` is checked first, then `fallback` (for proxies that move
/// the original header aside). Only the first whitespace-delimited word after
/// `Bearer ` is taken.
pub fn retrieve_token(headers: &HeaderMap, fallback: &HeaderName) -> Result<String, AuthError> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .or_else(|| headers.get(fallback))
        .ok_or(AuthError::MissingAuthorizationHeader(
            "Authorization header is missing.",
        ))?;

    raw.to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|rest| rest.split_whitespace().next())
        .map(str::to_string)
        .ok_or(AuthError::MissingAuthorizationHeader(
            "Authorization header is malformed.",
        ))
}
