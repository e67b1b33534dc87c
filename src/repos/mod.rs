/*
 * Responsibility
 * - Postgres (sqlx) による identity store / session store の実装
 */
pub mod error;
pub mod session_repo;
pub mod user_repo;

pub use session_repo::PgSessionStore;
pub use user_repo::PgIdentityStore;
