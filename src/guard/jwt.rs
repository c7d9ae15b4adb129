use super::{Error, jwks::Jwks};
use base64ct::{Base64UrlUnpadded, Encoding};
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::signature::Verifier;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;
use utoipa::ToSchema;

pub const TOKEN_USE_ID: &str = "id";
pub const TOKEN_USE_ACCESS: &str = "access";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    pub alg: String,
    pub kid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

/// Identity claims of a verified user pool token.
///
/// ID tokens carry `aud`, `email` and `cognito:username`; access tokens carry
/// `client_id`, `username` and `scope`. Both carry `sub` and `token_use`.
/// Every other claim (`custom:*` attributes, `phone_number`, `identities`)
/// is kept in `extra` and serialized back at the top level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct AuthenticatedUser {
    pub sub: String,
    pub iss: String,
    pub token_use: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(
        rename = "cognito:username",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cognito_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(
        rename = "cognito:groups",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub groups: Vec<String>,
    #[serde(flatten)]
    #[schema(ignore)]
    pub extra: Map<String, Value>,
}

impl AuthenticatedUser {
    /// Username regardless of token type.
    #[must_use]
    pub fn name(&self) -> &str {
        self.cognito_username
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or(&self.sub)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VerificationOptions<'a> {
    pub expected_issuer: &'a str,
    pub expected_client_id: &'a str,
    pub now_unix_seconds: i64,
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Verify an RS256 user pool token (JWT) and return its decoded claims.
///
/// # Errors
///
/// Returns an error if:
/// - the token is malformed or contains invalid base64/json,
/// - the `kid` is unknown for the provided JWKS,
/// - the signature is invalid,
/// - the claims fail validation (`iss`, `exp`, `nbf`, `token_use`, `aud`/`client_id`).
pub fn verify_rs256(
    token: &str,
    jwks: &Jwks,
    options: &VerificationOptions<'_>,
) -> Result<AuthenticatedUser, Error> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let claims_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
    if parts.next().is_some() {
        return Err(Error::TokenFormat);
    }

    let header: TokenHeader = b64d_json(header_b64)?;
    if header.alg != "RS256" {
        return Err(Error::UnsupportedAlg(header.alg));
    }

    let jwk = jwks
        .find_by_kid(&header.kid)
        .ok_or_else(|| Error::UnknownKid(header.kid.clone()))?;

    let public_key = jwk.to_rsa_public_key()?;
    let verifying_key = VerifyingKey::<Sha256>::new(public_key);
    let signing_input = format!("{header_b64}.{claims_b64}");
    let signature_bytes = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
    let signature =
        Signature::try_from(signature_bytes.as_slice()).map_err(|_| Error::InvalidSignature)?;
    verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| Error::InvalidSignature)?;

    let claims: AuthenticatedUser = b64d_json(claims_b64)?;
    if claims.iss != options.expected_issuer {
        return Err(Error::InvalidIssuer);
    }
    if claims.exp <= options.now_unix_seconds {
        return Err(Error::Expired);
    }
    if claims.nbf.is_some_and(|nbf| nbf > options.now_unix_seconds) {
        return Err(Error::NotYetValid);
    }

    let bound_client = match claims.token_use.as_str() {
        TOKEN_USE_ID => claims.aud.as_deref(),
        TOKEN_USE_ACCESS => claims.client_id.as_deref(),
        other => return Err(Error::InvalidTokenUse(other.to_string())),
    };
    if bound_client != Some(options.expected_client_id) {
        return Err(Error::InvalidAudience);
    }

    Ok(claims)
}
