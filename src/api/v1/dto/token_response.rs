use serde::Serialize;

use crate::services::auth::IssuedToken;

/// Response body of a successful login.
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub user_email: String,
    pub user_nicename: String,
    pub user_display_name: String,
}

impl From<IssuedToken> for TokenResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            token: issued.token,
            user_email: issued.user_email,
            user_nicename: issued.user_nicename,
            user_display_name: issued.user_display_name,
        }
    }
}
