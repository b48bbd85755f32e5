use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sensitivity::REDACTED;

/// A short-lived bearer token.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessToken(pub String);

/// A long-lived token exchanged for a new [`AccessToken`].
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefreshToken(pub String);

macro_rules! token_impls {
    ($name:ident) => {
        impl $name {
            /// Returns the raw token text.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&REDACTED).finish()
            }
        }
    };
}

token_impls!(AccessToken);
token_impls!(RefreshToken);

/// A user name and password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginCredentials {
    /// User name.
    pub username: String,
    /// Plain-text password.
    pub password: String,
}

impl LoginCredentials {
    /// Bundles a user name and password.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// The token pair presented to obtain a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenRequest {
    /// The expiring access token.
    pub access_token: AccessToken,
    /// The refresh token issued alongside it.
    pub refresh_token: RefreshToken,
}

/// Outcome of an authentication operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Whether the operation succeeded.
    pub succeeded: bool,
    /// Human-readable summary.
    pub message: String,
    /// The authenticated user, when there is one.
    pub user_id: Option<String>,
    /// Newly issued access token.
    pub access_token: Option<AccessToken>,
    /// Newly issued refresh token.
    pub refresh_token: Option<RefreshToken>,
    /// When `access_token` stops being accepted.
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthResponse {
    /// A successful response without tokens.
    pub fn ok(message: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            succeeded: true,
            message: message.into(),
            user_id,
            access_token: None,
            refresh_token: None,
            expires_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_secrets() {
        let token = AccessToken("eyJ".to_string());
        assert_eq!(format!("{:?}", token), "AccessToken(\"[REDACTED]\")");

        let credentials = LoginCredentials::new("alice", "hunter2");
        let text = format!("{:?}", credentials);
        assert!(text.contains("alice"));
        assert!(!text.contains("hunter2"));
    }

    #[test]
    fn tokens_serialize_transparently_to_json() {
        let token = RefreshToken("r1".to_string());
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"r1\"");
        assert_eq!(token.as_str(), "r1");
    }
}
