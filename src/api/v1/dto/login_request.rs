use serde::Deserialize;

use crate::error::AppError;

/// Request body for `POST {prefix}/login`.
///
/// `username` may be a login name or an email address.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    /// Both fields present and non-empty, or a 400 naming the missing ones.
    pub fn credentials(self) -> Result<(String, String), AppError> {
        let username = self.username.filter(|u| !u.trim().is_empty());
        let password = self.password.filter(|p| !p.is_empty());

        match (username, password) {
            (Some(u), Some(p)) => Ok((u.trim().to_string(), p)),
            (u, p) => {
                let missing: Vec<&str> = [("username", u.is_none()), ("password", p.is_none())]
                    .into_iter()
                    .filter_map(|(name, absent)| absent.then_some(name))
                    .collect();
                Err(AppError::bad_request(
                    "rest_missing_callback_param",
                    format!("Missing parameter(s): {}", missing.join(", ")),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_are_named() {
        let req = LoginRequest {
            username: Some("  ".into()),
            password: None,
        };
        match req.credentials() {
            Err(AppError::BadRequest { message, .. }) => {
                assert_eq!(message, "Missing parameter(s): username, password")
            }
            other => panic!("unexpected {other:?}"),
        }

        let req = LoginRequest {
            username: Some(" alice ".into()),
            password: Some("pw".into()),
        };
        assert_eq!(req.credentials().unwrap(), ("alice".into(), "pw".into()));
    }
}
