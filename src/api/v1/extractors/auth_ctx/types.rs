/*
 * Responsibility
 * - Handler から見える「認証済みコンテキスト」の型
 * - guard middleware が token を検証して request extensions に格納し、handler はこの型だけを受け取る
 */

use axum::http::Request;
use uuid::Uuid;

use crate::services::auth::Claims;
use crate::services::identity::{Principal, Subject};

/// 認証済みのリクエストに付与されるコンテキスト
///
/// - `user_id` は token の `data.user.id`
/// - `subject` は検証時点で identity store から引き直したユーザー
/// - `jti` は session token id (logout で破棄する対象)
#[derive(Debug, Clone)]
pub struct AuthCtx {
    pub user_id: Uuid,
    pub subject: Subject,
    pub jti: String,
    pub claims: Claims,
}

impl AuthCtx {
    pub fn new(subject: Subject, claims: Claims) -> Self {
        Self {
            user_id: subject.id,
            jti: claims.jti.clone(),
            subject,
            claims,
        }
    }
}

impl<B> Principal for Request<B> {
    fn principal(&self) -> Option<&Subject> {
        self.extensions().get::<AuthCtx>().map(|ctx| &ctx.subject)
    }
}
