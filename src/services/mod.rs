/*
 * Responsibility
 * - ドメインロジック (token 発行/検証, route guard, identity/session の契約)
 * - HTTP には依存しない層として保つ (axum の型は guard 周りのみ)
 */
pub mod auth;
pub mod identity;
pub mod routing;
pub mod session;
