/**
 * Responsibility
 * - repo が上位に伝える意味の定義
 */
use thiserror::Error;

use crate::services::identity::IdentityError;
use crate::services::session::SessionError;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("db error")]
    Db(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

impl From<RepoError> for IdentityError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Db(e) => IdentityError::Backend(e.to_string()),
        }
    }
}

impl From<RepoError> for SessionError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Db(e) => SessionError::Backend(e.to_string()),
        }
    }
}
