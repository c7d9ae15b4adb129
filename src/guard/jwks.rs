use super::Error;
use base64ct::{Base64UrlUnpadded, Encoding};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use serde::{Deserialize, Serialize};

/// JSON Web Key Set as published at `<issuer>/.well-known/jwks.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Parse a JWKS from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if `s` is not valid JSON or doesn't match the expected JWKS shape.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Find a key by `kid` (Key ID).
    #[must_use]
    pub fn find_by_kid(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    pub kty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    pub kid: String,
    pub n: String,
    pub e: String,
}

impl Jwk {
    /// Build a signing JWK from an `RsaPublicKey`.
    #[must_use]
    pub fn from_rsa_public_key(public_key: &RsaPublicKey, kid: impl Into<String>) -> Self {
        Self {
            kty: "RSA".to_string(),
            alg: Some("RS256".to_string()),
            key_use: Some("sig".to_string()),
            kid: kid.into(),
            n: Base64UrlUnpadded::encode_string(&public_key.n().to_bytes_be()),
            e: Base64UrlUnpadded::encode_string(&public_key.e().to_bytes_be()),
        }
    }

    /// Convert this JWK to an `RsaPublicKey`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not RSA, the base64url values cannot be
    /// decoded, or the RSA key is invalid.
    pub fn to_rsa_public_key(&self) -> Result<RsaPublicKey, Error> {
        if self.kty != "RSA" {
            return Err(Error::InvalidKeyType(self.kty.clone()));
        }
        let n_bytes = Base64UrlUnpadded::decode_vec(&self.n).map_err(|_| Error::Base64)?;
        let e_bytes = Base64UrlUnpadded::decode_vec(&self.e).map_err(|_| Error::Base64)?;
        let n = BigUint::from_bytes_be(&n_bytes);
        let e = BigUint::from_bytes_be(&e_bytes);
        Ok(RsaPublicKey::new(n, e)?)
    }
}
