use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::model::{AccessToken, AuthResponse, LoginCredentials, RefreshToken, RefreshTokenRequest};
use super::{AuthError, AuthenticationService};

const DEFAULT_TOKEN_LIFETIME_MINUTES: i64 = 15;

#[derive(Debug)]
struct User {
    id: String,
    password: String,
}

#[derive(Debug)]
struct Session {
    user_id: String,
    access_token: AccessToken,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    issued: u64,
    current: Option<String>,
    // Keyed by refresh token text.
    sessions: HashMap<String, Session>,
}

/// An [`AuthenticationService`] over a fixed set of users.
///
/// Tokens are opaque counters, not signed JWTs. "Current user" is the user
/// most recently signed in through this instance.
#[derive(Debug)]
pub struct InMemoryAuthenticationService {
    users: HashMap<String, User>,
    token_lifetime: Duration,
    state: Mutex<State>,
}

impl InMemoryAuthenticationService {
    /// Creates a service with no users.
    pub fn new() -> Self {
        Self {
            users: HashMap::new(),
            token_lifetime: Duration::minutes(DEFAULT_TOKEN_LIFETIME_MINUTES),
            state: Mutex::default(),
        }
    }

    /// Adds a user who may sign in as `username` with `password`.
    pub fn with_user(
        mut self,
        username: impl Into<String>,
        user_id: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.users.insert(
            username.into(),
            User {
                id: user_id.into(),
                password: password.into(),
            },
        );
        self
    }

    /// Sets how long issued access tokens stay valid.
    pub fn with_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.token_lifetime = lifetime;
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn issue(&self, state: &mut State, user_id: &str) -> AuthResponse {
        state.issued += 1;
        let access_token = AccessToken(format!("at.{}.{}", user_id, state.issued));
        let refresh_token = RefreshToken(format!("rt.{}.{}", user_id, state.issued));
        let expires_at = Utc::now() + self.token_lifetime;

        state.sessions.insert(
            refresh_token.0.clone(),
            Session {
                user_id: user_id.to_string(),
                access_token: access_token.clone(),
                expires_at,
            },
        );
        state.current = Some(user_id.to_string());

        AuthResponse {
            succeeded: true,
            message: "authenticated".to_string(),
            user_id: Some(user_id.to_string()),
            access_token: Some(access_token),
            refresh_token: Some(refresh_token),
            expires_at: Some(expires_at),
        }
    }
}

impl Default for InMemoryAuthenticationService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthenticationService for InMemoryAuthenticationService {
    async fn login(&self, credentials: LoginCredentials) -> Result<AuthResponse, AuthError> {
        let user = self
            .users
            .get(&credentials.username)
            .filter(|user| user.password == credentials.password)
            .ok_or(AuthError::InvalidCredentials)?;

        let mut state = self.state();
        Ok(self.issue(&mut state, &user.id))
    }

    async fn refresh_token(
        &self,
        request: RefreshTokenRequest,
    ) -> Result<AuthResponse, AuthError> {
        let mut state = self.state();
        // Refresh tokens are single use; a mismatched pair still burns it.
        let session = state
            .sessions
            .remove(request.refresh_token.as_str())
            .ok_or(AuthError::InvalidToken)?;
        if session.access_token != request.access_token {
            return Err(AuthError::InvalidToken);
        }

        Ok(self.issue(&mut state, &session.user_id))
    }

    async fn logout(&self) -> Result<AuthResponse, AuthError> {
        let mut state = self.state();
        let user_id = state.current.take().ok_or(AuthError::NotAuthenticated)?;
        state.sessions.retain(|_, session| session.user_id != user_id);
        Ok(AuthResponse::ok("signed out", Some(user_id)))
    }

    async fn validate_token(&self, user_id: &str) -> Result<AuthResponse, AuthError> {
        if !self.users.values().any(|user| user.id == user_id) {
            return Err(AuthError::UserNotFound(user_id.to_string()));
        }

        let now = Utc::now();
        let live = self
            .state()
            .sessions
            .values()
            .any(|session| session.user_id == user_id && session.expires_at > now);
        if live {
            Ok(AuthResponse::ok("token valid", Some(user_id.to_string())))
        } else {
            Err(AuthError::InvalidToken)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> InMemoryAuthenticationService {
        InMemoryAuthenticationService::new().with_user("alice", "u-1", "hunter2")
    }

    #[tokio::test]
    async fn login_issues_token_pair() {
        let service = service();

        let response = service
            .login(LoginCredentials::new("alice", "hunter2"))
            .await
            .unwrap();
        assert!(response.succeeded);
        assert_eq!(response.user_id.as_deref(), Some("u-1"));
        assert!(response.access_token.is_some());
        assert!(response.expires_at.unwrap() > Utc::now());

        assert!(service.validate_token("u-1").await.is_ok());
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let service = service();
        assert_eq!(
            service
                .login(LoginCredentials::new("alice", "wrong"))
                .await
                .unwrap_err(),
            AuthError::InvalidCredentials
        );
        assert_eq!(
            service
                .login(LoginCredentials::new("bob", "hunter2"))
                .await
                .unwrap_err(),
            AuthError::InvalidCredentials
        );
    }

    #[tokio::test]
    async fn refresh_rotates_tokens() {
        let service = service();
        let first = service
            .login(LoginCredentials::new("alice", "hunter2"))
            .await
            .unwrap();
        let request = RefreshTokenRequest {
            access_token: first.access_token.unwrap(),
            refresh_token: first.refresh_token.unwrap(),
        };

        let second = service.refresh_token(request.clone()).await.unwrap();
        assert_ne!(second.access_token, Some(request.access_token.clone()));

        assert_eq!(
            service.refresh_token(request).await.unwrap_err(),
            AuthError::InvalidToken
        );
    }

    #[tokio::test]
    async fn logout_revokes_sessions() {
        let service = service();
        assert_eq!(service.logout().await.unwrap_err(), AuthError::NotAuthenticated);

        service
            .login(LoginCredentials::new("alice", "hunter2"))
            .await
            .unwrap();
        let response = service.logout().await.unwrap();
        assert_eq!(response.user_id.as_deref(), Some("u-1"));

        assert_eq!(
            service.validate_token("u-1").await.unwrap_err(),
            AuthError::InvalidToken
        );
    }

    #[tokio::test]
    async fn expired_tokens_are_not_valid() {
        let service = service().with_token_lifetime(Duration::zero());
        service
            .login(LoginCredentials::new("alice", "hunter2"))
            .await
            .unwrap();

        assert!(service.validate_token("u-1").await.is_err());
        assert_eq!(
            service.validate_token("u-9").await.unwrap_err(),
            AuthError::UserNotFound("u-9".to_string())
        );
    }
}
