/*
 * Responsibility
 * - middleware の公開インターフェース
 * - pipeline (role/can などの step を合成する仕組み) と axum 側の layer
 */
pub mod auth;
pub mod builtin;
pub mod cors;
pub mod http;
pub mod pipeline;

pub use pipeline::{BoxFuture, Handler, Middleware, Next, Outcome, Pipeline, Step};
