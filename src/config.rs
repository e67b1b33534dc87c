/*
 * Responsibility
 * - 環境変数や設定の読み込み (JWT 署名設定, guard/ignore/middleware, session backend など)
 * - 設定値のバリデーション (不足・不正なら起動失敗。初回リクエストまで待たない)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::HeaderName;
use chrono::TimeDelta;
use url::Url;

use crate::services::auth::codec::MAX_LEEWAY_SECONDS;
use crate::services::auth::SigningAlgorithm;
use crate::services::auth::issuer::{DEFAULT_FALLBACK_HEADER, DEFAULT_TTL_SECONDS};
use crate::services::routing::parse_bindings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBackend {
    Memory,
    Postgres,
    Valkey,
}

impl FromStr for SessionBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "pg" => Ok(Self::Postgres),
            "valkey" | "redis" => Ok(Self::Valkey),
            _ => Err(ConfigError::Invalid("SESSION_BACKEND")),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    /// Canonical origin, used as `iss`.
    pub site_url: String,

    pub jwt_secret: String,
    pub jwt_algorithm: SigningAlgorithm,
    pub jwt_public_key_pem: Option<String>,
    pub jwt_ttl: TimeDelta,
    pub jwt_leeway_seconds: u64,

    pub jwt_namespace: String,
    pub jwt_rest_base: String,

    pub guard_patterns: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub middleware_bindings: Vec<(String, Vec<String>)>,

    pub auth_fallback_header: HeaderName,

    pub database_url: Option<String>,
    pub session_backend: SessionBackend,
    pub valkey_url: Option<String>,

    pub cors_allowed_origins: Vec<String>,
    pub request_timeout_seconds: u64,
    pub request_body_limit_bytes: usize,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // secret / key material は出さない
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("app_env", &self.app_env)
            .field("site_url", &self.site_url)
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field("jwt_ttl", &self.jwt_ttl)
            .field("jwt_namespace", &self.jwt_namespace)
            .field("jwt_rest_base", &self.jwt_rest_base)
            .field("session_backend", &self.session_backend)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port: u16 = match get("PORT") {
            Some(p) => p.parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            None => 4000,
        };
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = get("APP_ENV")
            .map(|v| AppEnv::parse(&v))
            .unwrap_or(AppEnv::Development);

        let site_url = get("SITE_URL").ok_or(ConfigError::Missing("SITE_URL"))?;
        let parsed = Url::parse(&site_url).map_err(|_| ConfigError::Invalid("SITE_URL"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid("SITE_URL"));
        }
        let site_url = site_url.trim_end_matches('/').to_string();

        let jwt_secret = get("JWT_SECRET")
            .ok_or(ConfigError::Missing("JWT_SECRET"))?
            .replace("\\n", "\n");

        let jwt_algorithm = match get("JWT_ALGO") {
            Some(a) => a
                .parse::<SigningAlgorithm>()
                .map_err(|_| ConfigError::Invalid("JWT_ALGO"))?,
            None => SigningAlgorithm::HS256,
        };

        let jwt_public_key_pem = get("JWT_PUBLIC_KEY").map(|v| v.replace("\\n", "\n"));
        if !jwt_algorithm.is_symmetric() && jwt_public_key_pem.is_none() {
            return Err(ConfigError::Missing("JWT_PUBLIC_KEY"));
        }

        let ttl_seconds = match get("JWT_TTL_SECONDS") {
            Some(v) => v
                .parse::<i64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or(ConfigError::Invalid("JWT_TTL_SECONDS"))?,
            None => DEFAULT_TTL_SECONDS,
        };
        let jwt_ttl =
            TimeDelta::try_seconds(ttl_seconds).ok_or(ConfigError::Invalid("JWT_TTL_SECONDS"))?;

        let jwt_leeway_seconds = match get("JWT_LEEWAY_SECONDS") {
            Some(v) => v
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs <= MAX_LEEWAY_SECONDS)
                .ok_or(ConfigError::Invalid("JWT_LEEWAY_SECONDS"))?,
            None => 0,
        };

        let jwt_namespace = path_segment(get("JWT_NAMESPACE"), "jwt/v1", "JWT_NAMESPACE")?;
        let jwt_rest_base = path_segment(get("JWT_REST_BASE"), "auth", "JWT_REST_BASE")?;

        let guard_patterns = comma_list(get("JWT_GUARD"));
        let ignore_patterns = comma_list(get("JWT_IGNORE"));
        let middleware_bindings = parse_bindings(&get("JWT_MIDDLEWARE").unwrap_or_default())
            .map_err(|_| ConfigError::Invalid("JWT_MIDDLEWARE"))?;

        let auth_fallback_header = HeaderName::from_str(
            &get("AUTH_FALLBACK_HEADER")
                .unwrap_or_else(|| DEFAULT_FALLBACK_HEADER.to_string())
                .to_ascii_lowercase(),
        )
        .map_err(|_| ConfigError::Invalid("AUTH_FALLBACK_HEADER"))?;

        let database_url = get("DATABASE_URL");
        let valkey_url = get("VALKEY_URL");

        let session_backend = match get("SESSION_BACKEND") {
            Some(b) => b.parse()?,
            None if database_url.is_some() => SessionBackend::Postgres,
            None => SessionBackend::Memory,
        };
        match session_backend {
            SessionBackend::Postgres if database_url.is_none() => {
                return Err(ConfigError::Missing("DATABASE_URL"));
            }
            SessionBackend::Valkey if valkey_url.is_none() => {
                return Err(ConfigError::Missing("VALKEY_URL"));
            }
            _ => {}
        }

        let cors_allowed_origins = comma_list(get("CORS_ALLOWED_ORIGINS"));

        let request_timeout_seconds = match get("REQUEST_TIMEOUT_SECONDS") {
            Some(v) => v
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or(ConfigError::Invalid("REQUEST_TIMEOUT_SECONDS"))?,
            None => 30,
        };

        let request_body_limit_bytes = match get("REQUEST_BODY_LIMIT_BYTES") {
            Some(v) => v
                .parse::<usize>()
                .map_err(|_| ConfigError::Invalid("REQUEST_BODY_LIMIT_BYTES"))?,
            None => 1024 * 1024,
        };

        Ok(Self {
            addr,
            app_env,
            site_url,
            jwt_secret,
            jwt_algorithm,
            jwt_public_key_pem,
            jwt_ttl,
            jwt_leeway_seconds,
            jwt_namespace,
            jwt_rest_base,
            guard_patterns,
            ignore_patterns,
            middleware_bindings,
            auth_fallback_header,
            database_url,
            session_backend,
            valkey_url,
            cors_allowed_origins,
            request_timeout_seconds,
            request_body_limit_bytes,
        })
    }

    /// `/{namespace}/{base}`, e.g. `/jwt/v1/auth`.
    pub fn auth_prefix(&self) -> String {
        format!("/{}/{}", self.jwt_namespace, self.jwt_rest_base)
    }
}

fn comma_list(raw: Option<String>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn path_segment(
    raw: Option<String>,
    default: &str,
    key: &'static str,
) -> Result<String, ConfigError> {
    let value = raw.unwrap_or_else(|| default.to_string());
    let value = value.trim_matches('/');
    if value.is_empty() || value.contains(char::is_whitespace) {
        return Err(ConfigError::Invalid(key));
    }
    Ok(value.to_string())
}
