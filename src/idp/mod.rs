//! Identity provider client.
//!
//! The rest of the crate talks to the identity provider only through
//! [`IdentityProvider`]. Every operation is keyed by username, resolves
//! exactly once, and reports provider refusals as [`ProviderError::Rejected`]
//! with the provider message intact. Nothing here retries.

pub mod cognito;
pub mod error;

pub use self::cognito::{CognitoClient, CognitoConfig};
pub use self::error::ProviderError;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result of a successful `ConfirmSignUp`.
pub const CONFIRMATION_SUCCESS: &str = "SUCCESS";

/// A user attribute sent along with signup (e.g. `email`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAttribute {
    pub name: String,
    pub value: String,
}

impl UserAttribute {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Where the provider sent a confirmation code.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CodeDeliveryDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_medium: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute_name: Option<String>,
}

/// Handle of a freshly created user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserHandle {
    pub username: String,
    pub user_sub: String,
    pub user_confirmed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_delivery_details: Option<CodeDeliveryDetails>,
}

/// Tokens issued by the provider. Passed through to the caller untouched.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_in: u64,
    pub token_type: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"***")
            .field("id_token", &self.id_token.as_ref().map(|_| "***"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "***"))
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ConfirmationResult {
    pub result: String,
}

impl ConfirmationResult {
    #[must_use]
    pub fn success() -> Self {
        Self {
            result: CONFIRMATION_SUCCESS.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_delivery_details: Option<CodeDeliveryDetails>,
}

/// Operations the gateway forwards to the identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(
        &self,
        name: &str,
        password: &SecretString,
        attributes: &[UserAttribute],
    ) -> Result<UserHandle, ProviderError>;

    async fn authenticate(
        &self,
        name: &str,
        password: &SecretString,
    ) -> Result<Session, ProviderError>;

    async fn confirm_registration(
        &self,
        name: &str,
        code: &SecretString,
    ) -> Result<ConfirmationResult, ProviderError>;

    async fn resend_confirmation_code(&self, name: &str) -> Result<DispatchResult, ProviderError>;

    /// Exchange a refresh token for new tokens. The provider does not issue a
    /// new refresh token, so implementations carry the presented one over.
    async fn refresh_session(
        &self,
        name: &str,
        refresh_token: &SecretString,
    ) -> Result<Session, ProviderError>;
}
