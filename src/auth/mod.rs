//! Façade between validated requests and the identity provider.
//!
//! One method per endpoint. Each call reaches the provider exactly once and
//! returns its result unchanged; any failure becomes an [`AuthError`] that
//! carries a human readable message.

pub mod types;

pub use self::types::{
    AuthenticateRequest, ConfirmRequest, RefreshRequest, RegisterRequest, ResendCodeRequest,
    Validate, ValidationError,
};

use crate::idp::{
    ConfirmationResult, DispatchResult, IdentityProvider, ProviderError, Session, UserAttribute,
    UserHandle,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
#[error("{message}")]
pub struct AuthError {
    message: String,
    code: Option<String>,
}

impl AuthError {
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Provider error code, when the provider rejected the call.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

impl From<ProviderError> for AuthError {
    fn from(err: ProviderError) -> Self {
        Self {
            code: err.code().map(str::to_string),
            message: err.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct AuthService {
    provider: Arc<dyn IdentityProvider>,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService").finish_non_exhaustive()
    }
}

impl AuthService {
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    /// Create the user with `email` as its only attribute.
    ///
    /// # Errors
    /// Returns the provider rejection (e.g. username taken, weak password).
    #[instrument(skip(self, request), fields(user = %request.name))]
    pub async fn register(&self, request: &RegisterRequest) -> Result<UserHandle, AuthError> {
        debug!("register");
        let attributes = [UserAttribute::new("email", request.email.as_str())];
        Ok(self
            .provider
            .sign_up(&request.name, &request.password, &attributes)
            .await?)
    }

    /// # Errors
    /// Returns the provider rejection (bad credentials, unconfirmed user, challenge).
    #[instrument(skip(self, request), fields(user = %request.name))]
    pub async fn authenticate(&self, request: &AuthenticateRequest) -> Result<Session, AuthError> {
        debug!("authenticate");
        Ok(self
            .provider
            .authenticate(&request.name, &request.password)
            .await?)
    }

    /// # Errors
    /// Returns the provider rejection (code mismatch, expired code, unknown user).
    #[instrument(skip(self, request), fields(user = %request.name))]
    pub async fn confirm(&self, request: &ConfirmRequest) -> Result<ConfirmationResult, AuthError> {
        debug!("confirm");
        Ok(self
            .provider
            .confirm_registration(&request.name, &request.code)
            .await?)
    }

    /// # Errors
    /// Returns the provider rejection (unknown user, already confirmed, throttled).
    #[instrument(skip(self, request), fields(user = %request.name))]
    pub async fn resend_code(
        &self,
        request: &ResendCodeRequest,
    ) -> Result<DispatchResult, AuthError> {
        debug!("resend confirmation code");
        Ok(self.provider.resend_confirmation_code(&request.name).await?)
    }

    /// # Errors
    /// Returns the provider rejection (revoked or expired refresh token).
    #[instrument(skip(self, request), fields(user = %request.name))]
    pub async fn refresh(&self, request: &RefreshRequest) -> Result<Session, AuthError> {
        debug!("refresh session");
        Ok(self
            .provider
            .refresh_session(&request.name, &request.refresh_token)
            .await?)
    }
}
