//! Cognito user pool client.
//!
//! Talks to the public Cognito Identity Provider JSON API
//! (`POST /` with `X-Amz-Target: AWSCognitoIdentityProviderService.<Action>`).
//! These actions are authorized by the app client id alone, so no AWS request
//! signing is involved. When the app client has a secret, every call carries
//! a `SECRET_HASH`.

use super::{
    CodeDeliveryDetails, ConfirmationResult, DispatchResult, IdentityProvider, ProviderError,
    Session, UserAttribute, UserHandle,
};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode, header::CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};
use sha2::Sha256;
use std::time::Duration;
use tracing::{Instrument, debug, info_span, instrument, warn};
use url::Url;

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const AMZ_JSON: &str = "application/x-amz-json-1.1";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

type HmacSha256 = Hmac<Sha256>;

/// Connection settings for one user pool app client.
#[derive(Debug, Clone)]
pub struct CognitoConfig {
    user_pool_id: String,
    client_id: String,
    client_secret: Option<SecretString>,
    region: String,
    endpoint: Option<String>,
    issuer: Option<String>,
    jwks_url: Option<String>,
    timeout: Duration,
}

impl CognitoConfig {
    /// Build a config for `user_pool_id`, deriving the region from its prefix.
    ///
    /// # Errors
    /// Returns an error if the pool id is not of the form `<region>_<id>`.
    pub fn new(user_pool_id: impl Into<String>, client_id: impl Into<String>) -> Result<Self> {
        let user_pool_id = user_pool_id.into();
        let region = region_from_pool_id(&user_pool_id)
            .ok_or_else(|| {
                anyhow!("Invalid user pool id, expected <region>_<id>: {user_pool_id}")
            })?
            .to_string();

        Ok(Self {
            user_pool_id,
            client_id: client_id.into(),
            client_secret: None,
            region,
            endpoint: None,
            issuer: None,
            jwks_url: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        })
    }

    /// Build a config with an explicit region; the pool id is used as-is.
    #[must_use]
    pub fn for_region(
        user_pool_id: impl Into<String>,
        client_id: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            user_pool_id: user_pool_id.into(),
            client_id: client_id.into(),
            client_secret: None,
            region: region.into(),
            endpoint: None,
            issuer: None,
            jwks_url: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        }
    }

    #[must_use]
    pub fn with_client_secret(mut self, secret: SecretString) -> Self {
        self.client_secret = Some(secret);
        self
    }

    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Override the API endpoint, e.g. for a local emulator.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    #[must_use]
    pub fn with_jwks_url(mut self, jwks_url: impl Into<String>) -> Self {
        self.jwks_url = Some(jwks_url.into());
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn user_pool_id(&self) -> &str {
        &self.user_pool_id
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://cognito-idp.{}.amazonaws.com/", self.region))
    }

    /// Expected `iss` claim of tokens issued by this pool.
    #[must_use]
    pub fn issuer(&self) -> String {
        self.issuer.clone().unwrap_or_else(|| {
            format!(
                "https://cognito-idp.{}.amazonaws.com/{}",
                self.region, self.user_pool_id
            )
        })
    }

    #[must_use]
    pub fn jwks_url(&self) -> String {
        self.jwks_url.clone().unwrap_or_else(|| {
            format!("{}/.well-known/jwks.json", self.issuer().trim_end_matches('/'))
        })
    }
}

/// `us-east-1_AbCdEf` -> `us-east-1`
#[must_use]
pub fn region_from_pool_id(user_pool_id: &str) -> Option<&str> {
    match user_pool_id.split_once('_') {
        Some((region, id)) if !region.is_empty() && !id.is_empty() => Some(region),
        _ => None,
    }
}

/// `base64(HMAC-SHA256(client_secret, username + client_id))`
///
/// # Errors
/// Returns an error if the secret cannot be used as an HMAC key.
pub fn secret_hash(
    client_secret: &str,
    username: &str,
    client_id: &str,
) -> Result<String, ProviderError> {
    let mut mac = HmacSha256::new_from_slice(client_secret.as_bytes())
        .map_err(|e| ProviderError::Config(e.to_string()))?;
    mac.update(username.as_bytes());
    mac.update(client_id.as_bytes());
    Ok(Base64::encode_string(&mac.finalize().into_bytes()))
}

#[derive(Debug)]
pub struct CognitoClient {
    client: Client,
    endpoint: Url,
    client_id: String,
    client_secret: Option<SecretString>,
}

impl CognitoClient {
    /// Build a client for the configured pool. Every request is bounded by
    /// the config timeout.
    ///
    /// # Errors
    /// Returns an error if the endpoint is not a valid URL or the HTTP client
    /// cannot be built.
    pub fn new(config: &CognitoConfig) -> Result<Self> {
        let endpoint_str = config.endpoint();
        let endpoint = Url::parse(&endpoint_str)
            .with_context(|| format!("Invalid identity provider endpoint: {endpoint_str}"))?;

        let client = Client::builder()
            .use_rustls_tls()
            .user_agent(crate::APP_USER_AGENT)
            .connect_timeout(config.timeout())
            .timeout(config.timeout())
            .build()
            .context("Failed to build identity provider HTTP client")?;

        Ok(Self {
            client,
            endpoint,
            client_id: config.client_id().to_string(),
            client_secret: config.client_secret.clone(),
        })
    }

    fn secret_hash(&self, username: &str) -> Result<Option<String>, ProviderError> {
        self.client_secret
            .as_ref()
            .map(|secret| secret_hash(secret.expose_secret(), username, &self.client_id))
            .transpose()
    }

    /// Send one action and decode the success body into `T`.
    async fn call<T: DeserializeOwned>(&self, action: &str, body: Value) -> Result<T, ProviderError> {
        let span = info_span!(
            "idp.request",
            idp.action = action,
            http.method = "POST",
            http.status_code = tracing::field::Empty
        );
        async {
            let response = self
                .client
                .post(self.endpoint.clone())
                .header(CONTENT_TYPE, AMZ_JSON)
                .header("X-Amz-Target", format!("{TARGET_PREFIX}.{action}"))
                .body(body.to_string())
                .send()
                .await?;

            let status = response.status();
            tracing::Span::current().record("http.status_code", status.as_u16());
            let bytes = response.bytes().await?;

            if !status.is_success() {
                let err = rejection(status, &bytes);
                debug!(error = %err, "identity provider rejected {action}");
                return Err(err);
            }

            serde_json::from_slice(&bytes).map_err(|e| ProviderError::Decode(e.to_string()))
        }
        .instrument(span)
        .await
    }

    async fn initiate_auth(
        &self,
        flow: &str,
        username: &str,
        mut parameters: Map<String, Value>,
    ) -> Result<AuthenticationResult, ProviderError> {
        if let Some(hash) = self.secret_hash(username)? {
            parameters.insert("SECRET_HASH".to_string(), Value::String(hash));
        }

        let body = json!({
            "AuthFlow": flow,
            "ClientId": self.client_id,
            "AuthParameters": parameters,
        });

        let response: InitiateAuthResponse = self.call("InitiateAuth", body).await?;
        match (response.authentication_result, response.challenge_name) {
            (Some(result), _) => Ok(result),
            (None, Some(challenge)) => {
                warn!(challenge = %challenge, "authentication answered with a challenge");
                Err(ProviderError::Challenge(challenge))
            }
            (None, None) => Err(ProviderError::Decode(
                "missing AuthenticationResult".to_string(),
            )),
        }
    }

    fn with_secret_hash(&self, mut body: Value, username: &str) -> Result<Value, ProviderError> {
        if let (Some(hash), Some(object)) = (self.secret_hash(username)?, body.as_object_mut()) {
            object.insert("SecretHash".to_string(), Value::String(hash));
        }
        Ok(body)
    }
}

#[async_trait]
impl IdentityProvider for CognitoClient {
    #[instrument(skip(self, password, attributes))]
    async fn sign_up(
        &self,
        name: &str,
        password: &SecretString,
        attributes: &[UserAttribute],
    ) -> Result<UserHandle, ProviderError> {
        let attributes: Vec<Value> = attributes
            .iter()
            .map(|attribute| json!({ "Name": attribute.name, "Value": attribute.value }))
            .collect();

        let body = self.with_secret_hash(
            json!({
                "ClientId": self.client_id,
                "Username": name,
                "Password": password.expose_secret(),
                "UserAttributes": attributes,
            }),
            name,
        )?;

        let response: SignUpResponse = self.call("SignUp", body).await?;

        Ok(UserHandle {
            username: name.to_string(),
            user_sub: response.user_sub,
            user_confirmed: response.user_confirmed,
            code_delivery_details: response.code_delivery_details.map(Into::into),
        })
    }

    #[instrument(skip(self, password))]
    async fn authenticate(
        &self,
        name: &str,
        password: &SecretString,
    ) -> Result<Session, ProviderError> {
        let mut parameters = Map::new();
        parameters.insert("USERNAME".to_string(), Value::from(name));
        parameters.insert(
            "PASSWORD".to_string(),
            Value::from(password.expose_secret()),
        );

        let result = self
            .initiate_auth("USER_PASSWORD_AUTH", name, parameters)
            .await?;
        Ok(result.into_session(None))
    }

    #[instrument(skip(self, code))]
    async fn confirm_registration(
        &self,
        name: &str,
        code: &SecretString,
    ) -> Result<ConfirmationResult, ProviderError> {
        let body = self.with_secret_hash(
            json!({
                "ClientId": self.client_id,
                "Username": name,
                "ConfirmationCode": code.expose_secret(),
                "ForceAliasCreation": false,
            }),
            name,
        )?;

        let _: serde::de::IgnoredAny = self.call("ConfirmSignUp", body).await?;
        Ok(ConfirmationResult::success())
    }

    #[instrument(skip(self))]
    async fn resend_confirmation_code(&self, name: &str) -> Result<DispatchResult, ProviderError> {
        let body = self.with_secret_hash(
            json!({
                "ClientId": self.client_id,
                "Username": name,
            }),
            name,
        )?;

        let response: ResendResponse = self.call("ResendConfirmationCode", body).await?;
        Ok(DispatchResult {
            code_delivery_details: response.code_delivery_details.map(Into::into),
        })
    }

    #[instrument(skip(self, refresh_token))]
    async fn refresh_session(
        &self,
        name: &str,
        refresh_token: &SecretString,
    ) -> Result<Session, ProviderError> {
        let mut parameters = Map::new();
        parameters.insert(
            "REFRESH_TOKEN".to_string(),
            Value::from(refresh_token.expose_secret()),
        );

        let result = self
            .initiate_auth("REFRESH_TOKEN_AUTH", name, parameters)
            .await?;
        Ok(result.into_session(Some(refresh_token)))
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type")]
    kind: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

/// Turn a non-2xx provider body into a rejection, keeping its message.
fn rejection(status: StatusCode, body: &[u8]) -> ProviderError {
    let parsed: Option<ErrorBody> = serde_json::from_slice(body).ok();
    let (kind, message) = parsed.map_or((None, None), |b| (b.kind, b.message));

    // `__type` may be namespaced: "com.amazonaws...#NotAuthorizedException"
    let code = kind
        .as_deref()
        .map(|k| k.rsplit('#').next().unwrap_or(k).to_string())
        .unwrap_or_else(|| status.as_u16().to_string());

    let message = message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            kind.map_or_else(
                || {
                    status
                        .canonical_reason()
                        .unwrap_or("identity provider error")
                        .to_string()
                },
                |_| code.clone(),
            )
        });

    ProviderError::Rejected { code, message }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DeliveryDetails {
    destination: Option<String>,
    delivery_medium: Option<String>,
    attribute_name: Option<String>,
}

impl From<DeliveryDetails> for CodeDeliveryDetails {
    fn from(details: DeliveryDetails) -> Self {
        Self {
            destination: details.destination,
            delivery_medium: details.delivery_medium,
            attribute_name: details.attribute_name,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SignUpResponse {
    #[serde(default)]
    user_confirmed: bool,
    user_sub: String,
    code_delivery_details: Option<DeliveryDetails>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResendResponse {
    code_delivery_details: Option<DeliveryDetails>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    authentication_result: Option<AuthenticationResult>,
    challenge_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    access_token: String,
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: u64,
    token_type: String,
}

impl AuthenticationResult {
    fn into_session(self, presented_refresh_token: Option<&SecretString>) -> Session {
        let refresh_token = self.refresh_token.or_else(|| {
            presented_refresh_token.map(|token| token.expose_secret().to_string())
        });

        Session {
            access_token: self.access_token,
            id_token: self.id_token,
            refresh_token,
            expires_in: self.expires_in,
            token_type: self.token_type,
        }
    }
}
