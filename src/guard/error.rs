use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid authorization header")]
    InvalidHeader,
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("unknown key id: {0}")]
    UnknownKid(String),
    #[error("invalid key type: {0}")]
    InvalidKeyType(String),
    #[error("rsa error")]
    Rsa(#[from] rsa::Error),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("invalid audience")]
    InvalidAudience,
    #[error("invalid token use: {0}")]
    InvalidTokenUse(String),
    #[error("signing keys unavailable")]
    KeysUnavailable,
}
