/*
 * Responsibility
 * - Config読み込み → 依存生成 (store / AuthService) → Router 組み立て
 * - Middleware の適用 (guard/CORS/HTTP)
 * - axum::serve() で起動
 */
use std::{panic, process, sync::Arc};

use anyhow::{Context, Result};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::{Config, SessionBackend};
use crate::middleware::{auth::guard, cors, http};
use crate::repos::{PgIdentityStore, PgSessionStore};
use crate::services::identity::{IdentityStore, InMemoryIdentityStore};
use crate::services::session::{InMemorySessionStore, SessionStore, ValkeySessionStore};
use crate::state::AppState;

fn init_tracing() {
    // RUST_LOG があればそれを優先
    // ex: RUST_LOG=info,jwt_guard=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // development では即落として気付けるようにする
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;
    init_panic_hook(!config.app_env.is_production());

    info!(
        env = ?config.app_env,
        addr = %config.addr,
        algorithm = %config.jwt_algorithm,
        prefix = %config.auth_prefix(),
        "starting jwt-guard"
    );

    let state = build_state(&config).await?;
    let app = build_router(state, &config, api::v1::routes(&config.auth_prefix()));

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Pick the identity/session backends from config and assemble the state.
pub async fn build_state(config: &Config) -> Result<AppState> {
    let pool = match &config.database_url {
        Some(url) => Some(
            PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .context("connecting to DATABASE_URL")?,
        ),
        None => None,
    };

    let identities: Arc<dyn IdentityStore> = match &pool {
        Some(pool) => Arc::new(PgIdentityStore::new(pool.clone())),
        None => {
            warn!("DATABASE_URL is not set, using an empty in-memory identity store");
            Arc::new(InMemoryIdentityStore::new())
        }
    };

    let sessions: Arc<dyn SessionStore> = match config.session_backend {
        SessionBackend::Memory => Arc::new(InMemorySessionStore::new()),
        SessionBackend::Postgres => {
            let pool = pool.context("SESSION_BACKEND=postgres requires DATABASE_URL")?;
            Arc::new(PgSessionStore::new(pool))
        }
        SessionBackend::Valkey => {
            let url = config
                .valkey_url
                .as_deref()
                .context("SESSION_BACKEND=valkey requires VALKEY_URL")?;
            Arc::new(ValkeySessionStore::connect(url).await?)
        }
    };
    info!(backend = ?config.session_backend, "session store ready");

    Ok(AppState::from_config(config, identities, sessions)?)
}

/// `routes` には guard を掛ける route 一式を渡す (通常は `api::v1::routes`)。
pub fn build_router(state: AppState, config: &Config, routes: Router<AppState>) -> Router {
    let router = guard::apply(routes, state.clone()).with_state(state);
    let router = cors::apply(router, config);
    http::apply(router, config)
}
