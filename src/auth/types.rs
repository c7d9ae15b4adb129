//! Request bodies for the auth endpoints.
//!
//! Bodies only derive `Deserialize`: secrets are never serialized back out,
//! and their `Debug` output is redacted by `SecretString`.

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} should not be empty")]
    Blank(&'static str),
    #[error("email must be an email")]
    InvalidEmail,
}

/// Checks that run after the body parsed but before any provider call.
pub trait Validate {
    /// # Errors
    /// Returns the first field that fails validation.
    fn validate(&self) -> Result<(), ValidationError>;
}

fn required(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Blank(field))
    } else {
        Ok(())
    }
}

fn required_secret(field: &'static str, value: &SecretString) -> Result<(), ValidationError> {
    required(field, value.expose_secret())
}

/// Basic email format check.
#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    #[schema(value_type = String, format = Password)]
    pub password: SecretString,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        required("name", &self.name)?;
        required("email", &self.email)?;
        if !valid_email(&self.email) {
            return Err(ValidationError::InvalidEmail);
        }
        required_secret("password", &self.password)
    }
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct AuthenticateRequest {
    pub name: String,
    #[schema(value_type = String, format = Password)]
    pub password: SecretString,
}

impl Validate for AuthenticateRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        required("name", &self.name)?;
        required_secret("password", &self.password)
    }
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct ConfirmRequest {
    pub name: String,
    #[schema(value_type = String)]
    pub code: SecretString,
}

impl Validate for ConfirmRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        required("name", &self.name)?;
        required_secret("code", &self.code)
    }
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct ResendCodeRequest {
    pub name: String,
}

impl Validate for ResendCodeRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        required("name", &self.name)
    }
}

#[derive(ToSchema, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub name: String,
    #[schema(value_type = String)]
    pub refresh_token: SecretString,
}

impl Validate for RefreshRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        required("name", &self.name)?;
        required_secret("refreshToken", &self.refresh_token)
    }
}
