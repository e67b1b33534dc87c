/*
 * Responsibility
 * - users テーブル向け SQLx 操作 (IdentityStore 実装)
 * - パスワード検証は DB 側 (pgcrypto の crypt()) に任せ、アプリは hash を扱わない
 */
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use tracing::error;
use uuid::Uuid;

use crate::repos::error::{RepoError, RepoResult};
use crate::services::identity::{IdentityError, IdentityStore, Subject};

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub login: String,
    pub email: String,
    pub display_name: String,
    pub nice_name: String,
    pub roles: Vec<String>,
    pub capabilities: Vec<String>,
}

impl From<UserRow> for Subject {
    fn from(row: UserRow) -> Self {
        Subject {
            id: row.id,
            login: row.login,
            email: row.email,
            display_name: row.display_name,
            nice_name: row.nice_name,
            roles: row.roles.into_iter().collect(),
            capabilities: row.capabilities.into_iter().collect(),
        }
    }
}

const USER_COLUMNS: &str = "id, login, email, display_name, nice_name, roles, capabilities";

#[derive(Clone, Debug)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(&self, condition: &str, value: &str) -> RepoResult<Option<UserRow>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {condition}");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepoError::Db)?;

        Ok(row)
    }

    pub async fn get(&self, id: Uuid) -> RepoResult<Option<UserRow>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepoError::Db)?;

        Ok(row)
    }

    /// Returns the user when `password` matches the stored crypt() hash.
    pub async fn verify_password(
        &self,
        username: &str,
        password: &str,
    ) -> RepoResult<Option<UserRow>> {
        let sql = format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE (login = $1 OR lower(email) = lower($1))
              AND password_hash = crypt($2, password_hash)
            LIMIT 1
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .bind(password)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepoError::Db)?;

        Ok(row)
    }
}

fn logged(op: &'static str) -> impl Fn(RepoError) -> IdentityError {
    move |e| {
        error!(op, error = %e, "identity query failed");
        IdentityError::from(e)
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn resolve_by_id(&self, id: Uuid) -> Result<Option<Subject>, IdentityError> {
        let row = self.get(id).await.map_err(logged("resolve_by_id"))?;
        Ok(row.map(Subject::from))
    }

    async fn resolve_by_email(&self, email: &str) -> Result<Option<Subject>, IdentityError> {
        let row = self
            .fetch_one_where("lower(email) = lower($1)", email)
            .await
            .map_err(logged("resolve_by_email"))?;
        Ok(row.map(Subject::from))
    }

    async fn resolve_by_login(&self, login: &str) -> Result<Option<Subject>, IdentityError> {
        let row = self
            .fetch_one_where("login = $1", login)
            .await
            .map_err(logged("resolve_by_login"))?;
        Ok(row.map(Subject::from))
    }

    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Subject, IdentityError> {
        self.verify_password(username, password)
            .await
            .map_err(logged("authenticate"))?
            .map(Subject::from)
            .ok_or(IdentityError::InvalidCredentials)
    }
}
