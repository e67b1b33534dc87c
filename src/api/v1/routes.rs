/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - {namespace}/{base}/login|validate|logout と /health
 * - guard は route_layer で app 側から掛ける
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::api::v1::handlers::{
    auth::{login, logout, validate},
    health::health,
};
use crate::state::AppState;

/// `prefix` is `/{namespace}/{base}`, e.g. `/jwt/v1/auth`.
pub fn routes(prefix: &str) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route(&format!("{prefix}/login"), post(login))
        .route(&format!("{prefix}/validate"), post(validate))
        .route(&format!("{prefix}/logout"), get(logout))
}
