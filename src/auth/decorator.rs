use std::sync::Arc;

use async_trait::async_trait;

use super::model::{AuthResponse, LoginCredentials, RefreshTokenRequest};
use super::{AuthError, AuthenticationService};
use crate::instrument::Instrumentation;
use crate::logging::CapabilityLogger;
use crate::serializer::LogArg;

/// Logs every [`AuthenticationService`] call before delegating it unchanged.
///
/// Credentials, token requests and the tokens inside responses are
/// redacted by type name.
#[derive(Debug)]
pub struct AuthenticationServiceLoggingDecorator {
    base: Instrumentation<dyn AuthenticationService>,
}

impl AuthenticationServiceLoggingDecorator {
    /// Wraps `inner`, logging through `logger`.
    pub fn new(inner: Arc<dyn AuthenticationService>, logger: CapabilityLogger) -> Self {
        Self {
            base: Instrumentation::new(inner, logger),
        }
    }
}

#[async_trait]
impl AuthenticationService for AuthenticationServiceLoggingDecorator {
    async fn login(&self, credentials: LoginCredentials) -> Result<AuthResponse, AuthError> {
        let params = [LogArg::new(&credentials)];
        let call = || self.base.inner().login(credentials.clone());
        self.base.observe("login", &params, call).await
    }

    async fn refresh_token(
        &self,
        request: RefreshTokenRequest,
    ) -> Result<AuthResponse, AuthError> {
        let params = [LogArg::new(&request)];
        let call = || self.base.inner().refresh_token(request.clone());
        self.base.observe("refresh_token", &params, call).await
    }

    async fn logout(&self) -> Result<AuthResponse, AuthError> {
        self.base
            .observe("logout", &[], || self.base.inner().logout())
            .await
    }

    async fn validate_token(&self, user_id: &str) -> Result<AuthResponse, AuthError> {
        self.base
            .observe(
                "validate_token",
                &[LogArg::new(&user_id)],
                || self.base.inner().validate_token(user_id),
            )
            .await
    }
}
