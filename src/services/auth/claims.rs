//! JWT claim set issued and accepted by the service.
//!
//! Wire shape:
//! ```json
//! {
//!   "iss": "https://example.com", "iat": 1700000000, "nbf": 1700000000,
//!   "exp": 1700604800, "jti": "<session token id>",
//!   "data": { "user": { "id": "<uuid>" } }
//! }
//! ```
//! Hook-provided entries are flattened next to the standard claims and next
//! to `user` inside `data`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Top-level names that hooks may not override.
pub const RESERVED_CLAIMS: &[&str] = &["iss", "iat", "nbf", "exp", "jti", "data"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub jti: String,
    #[serde(default)]
    pub data: TokenData,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenData {
    #[serde(default)]
    pub user: TokenUser,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
}

impl Claims {
    pub fn user_id(&self) -> Option<Uuid> {
        self.data.user.id
    }
}
