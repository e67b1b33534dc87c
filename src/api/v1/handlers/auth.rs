/*
 * Responsibility
 * - POST {prefix}/login    : credentials → token
 * - POST {prefix}/validate : bearer token → claims (誰でも叩ける)
 * - GET  {prefix}/logout   : guard 済みの bearer token の session を破棄
 */
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use tracing::info;

use crate::api::v1::dto::{login_request::LoginRequest, token_response::TokenResponse};
use crate::api::v1::extractors::AuthCtx;
use crate::error::AppError;
use crate::services::auth::Claims;
use crate::state::AppState;

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let (username, password) = req.credentials()?;

    let issued = state
        .auth
        .issuer()
        .issue_by_credentials(&username, &password)
        .await?;

    Ok(Json(issued.into()))
}

pub async fn validate(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Claims>, AppError> {
    let claims = state.auth.issuer().validate(None, &headers).await?;
    Ok(Json(claims))
}

pub async fn logout(
    State(state): State<AppState>,
    ctx: AuthCtx,
    headers: HeaderMap,
) -> Json<bool> {
    let done = state.auth.issuer().invalidate(None, &headers).await;
    info!(user_id = %ctx.user_id, "logout");
    Json(done)
}
