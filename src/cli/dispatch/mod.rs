use crate::cli::{
    actions::{Action, server::Args},
    commands::{ARG_PORT, provider},
};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);

    let user_pool_id = matches
        .get_one::<String>(provider::ARG_USER_POOL_ID)
        .cloned()
        .context("missing required argument: --user-pool-id")?;
    let client_id = matches
        .get_one::<String>(provider::ARG_CLIENT_ID)
        .cloned()
        .context("missing required argument: --client-id")?;

    let client_secret = matches
        .get_one::<String>(provider::ARG_CLIENT_SECRET)
        .filter(|secret| !secret.is_empty())
        .map(|secret| SecretString::from(secret.clone()));

    let provider_timeout_seconds = matches
        .get_one::<u64>(provider::ARG_PROVIDER_TIMEOUT_SECONDS)
        .copied()
        .unwrap_or(crate::idp::cognito::DEFAULT_TIMEOUT_SECONDS);

    Ok(Action::Server(Args {
        port,
        user_pool_id,
        client_id,
        client_secret,
        region: matches.get_one::<String>(provider::ARG_REGION).cloned(),
        idp_endpoint: matches
            .get_one::<String>(provider::ARG_IDP_ENDPOINT)
            .cloned(),
        issuer: matches.get_one::<String>(provider::ARG_ISSUER).cloned(),
        jwks_url: matches.get_one::<String>(provider::ARG_JWKS_URL).cloned(),
        provider_timeout_seconds,
    }))
}
