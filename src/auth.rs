//! The authentication capability and its logging decorator.
//!
//! Every value crossing this interface either is a credential or carries
//! one, so it doubles as the reference case for redaction: credential and
//! token types are recognised by name and logged as `[REDACTED]`, including
//! when they appear as fields of an otherwise loggable [`AuthResponse`].

mod decorator;
mod memory;
mod model;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::capability::Capability;
use crate::error::CompositionError;
use crate::registry::ServiceCollection;

pub use decorator::AuthenticationServiceLoggingDecorator;
pub use memory::InMemoryAuthenticationService;
pub use model::{AccessToken, AuthResponse, LoginCredentials, RefreshToken, RefreshTokenRequest};

/// Failures of authentication operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Unknown user name or wrong password.
    #[error("invalid user name or password")]
    InvalidCredentials,
    /// The presented token pair is unknown, revoked, or expired.
    #[error("invalid or expired token")]
    InvalidToken,
    /// No user is signed in.
    #[error("no user is signed in")]
    NotAuthenticated,
    /// No user has the given id.
    #[error("user {0} not found")]
    UserNotFound(String),
}

/// Signing users in and out.
#[async_trait]
pub trait AuthenticationService: Send + Sync {
    /// Authenticates a user and issues a token pair.
    async fn login(&self, credentials: LoginCredentials) -> Result<AuthResponse, AuthError>;

    /// Exchanges a valid refresh token for a new token pair.
    async fn refresh_token(&self, request: RefreshTokenRequest)
        -> Result<AuthResponse, AuthError>;

    /// Signs out the current user and revokes their tokens.
    async fn logout(&self) -> Result<AuthResponse, AuthError>;

    /// Confirms that `user_id` holds a live session.
    async fn validate_token(&self, user_id: &str) -> Result<AuthResponse, AuthError>;
}

impl Capability for dyn AuthenticationService {
    const NAME: &'static str = "AuthenticationService";
}

/// Wraps the registered [`AuthenticationService`] in an
/// [`AuthenticationServiceLoggingDecorator`].
///
/// # Errors
///
/// Returns [`CompositionError::NotRegistered`] if no authentication service
/// has been registered yet.
pub fn decorate_authentication_service(
    services: &mut ServiceCollection,
) -> Result<(), CompositionError> {
    services.decorate::<dyn AuthenticationService, _>(|inner, logger| {
        Arc::new(AuthenticationServiceLoggingDecorator::new(inner, logger))
    })?;
    Ok(())
}
