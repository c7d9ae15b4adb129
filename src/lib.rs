//! # idp-gateway
//!
//! `idp-gateway` is a thin HTTP front for an Amazon Cognito user pool. It
//! exposes signup, login, confirmation, code resend and token refresh, and
//! forwards each call to the identity provider unchanged.
//!
//! ## What lives where
//!
//! - [`idp`]: the identity provider client (`SignUp`, `InitiateAuth`,
//!   `ConfirmSignUp`, `ResendConfirmationCode`) behind the
//!   [`idp::IdentityProvider`] trait.
//! - [`auth`]: the façade that turns validated requests into provider calls.
//! - [`guard`]: bearer token verification against the user pool JWKS.
//! - [`api`]: routes, request validation and error responses.
//! - [`cli`]: flags, telemetry and server startup.
//!
//! ## State
//!
//! Nothing is persisted here. Users, confirmation codes and sessions live in
//! the identity provider. Passwords, codes and refresh tokens are wrapped in
//! `SecretString` so they never show up in logs or traces.

pub mod api;
pub mod auth;
pub mod cli;
pub mod guard;
pub mod idp;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// First seven characters of a commit hash, or the whole hash if shorter.
#[must_use]
pub fn short_commit(hash: &str) -> &str {
    let hash = hash.trim();
    hash.get(..7).unwrap_or(hash)
}
