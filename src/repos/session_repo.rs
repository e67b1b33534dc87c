/*
 * Responsibility
 * - jwt_sessions テーブル向け SQLx 操作 (SessionStore 実装)
 * - token id そのものは保存しない。sha256 の hash だけを持つ
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{debug, error};
use uuid::Uuid;

use crate::repos::error::{RepoError, RepoResult};
use crate::services::session::token::{generate_token_id, hash_token_id};
use crate::services::session::{SessionError, SessionRecord, SessionStore};

#[derive(Clone, Debug, FromRow)]
pub struct SessionRow {
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub jwt: bool,
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        SessionRecord {
            user_id: row.user_id,
            expires_at: row.expires_at,
            created_at: row.created_at,
            jwt: row.jwt,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        user_id: Uuid,
        token_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> RepoResult<SessionRow> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO jwt_sessions (user_id, token_hash, expires_at, jwt)
            VALUES ($1, $2, $3, true)
            RETURNING user_id, expires_at, created_at, jwt
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::Db)?;

        Ok(row)
    }

    // Fetch a session that has not expired yet.
    pub async fn get_live(
        &self,
        user_id: Uuid,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> RepoResult<Option<SessionRow>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT user_id, expires_at, created_at, jwt
            FROM jwt_sessions
            WHERE user_id = $1 AND token_hash = $2 AND expires_at >= $3
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepoError::Db)?;

        Ok(row)
    }

    pub async fn delete(&self, user_id: Uuid, token_hash: &[u8]) -> RepoResult<u64> {
        let res = sqlx::query(
            r#"
            DELETE FROM jwt_sessions
            WHERE user_id = $1 AND token_hash = $2
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .execute(&self.pool)
        .await
        .map_err(RepoError::Db)?;

        Ok(res.rows_affected())
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(
        &self,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<String, SessionError> {
        let token_id = generate_token_id()?;
        self.insert(user_id, &hash_token_id(&token_id), expires_at)
            .await
            .map_err(|e| {
                error!(user_id = %user_id, error = %e, "failed to create jwt session");
                SessionError::from(e)
            })?;

        Ok(token_id)
    }

    async fn verify(&self, user_id: Uuid, token_id: &str) -> Result<bool, SessionError> {
        let row = self
            .get_live(user_id, &hash_token_id(token_id), Utc::now())
            .await?;

        Ok(row.map(SessionRecord::from).is_some_and(|r| r.jwt))
    }

    async fn destroy(&self, user_id: Uuid, token_id: &str) -> Result<(), SessionError> {
        let removed = self.delete(user_id, &hash_token_id(token_id)).await?;
        debug!(user_id = %user_id, removed, "jwt session destroyed");
        Ok(())
    }
}
