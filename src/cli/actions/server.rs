use crate::{
    api,
    auth::AuthService,
    cli::telemetry,
    guard::TokenVerifier,
    idp::{CognitoClient, CognitoConfig},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub user_pool_id: String,
    pub client_id: String,
    pub client_secret: Option<SecretString>,
    pub region: Option<String>,
    pub idp_endpoint: Option<String>,
    pub issuer: Option<String>,
    pub jwks_url: Option<String>,
    pub provider_timeout_seconds: u64,
}

impl Args {
    /// Provider configuration with every override applied.
    ///
    /// # Errors
    /// Returns an error if the region cannot be derived from the user pool id.
    pub fn cognito_config(&self) -> Result<CognitoConfig> {
        let mut config = match &self.region {
            Some(region) => CognitoConfig::for_region(&self.user_pool_id, &self.client_id, region),
            None => CognitoConfig::new(&self.user_pool_id, &self.client_id)
                .context("Could not derive the AWS region, set --region")?,
        };

        config = config.with_timeout(Duration::from_secs(self.provider_timeout_seconds));

        if let Some(secret) = &self.client_secret {
            config = config.with_client_secret(secret.clone());
        }
        if let Some(endpoint) = &self.idp_endpoint {
            config = config.with_endpoint(endpoint.clone());
        }
        if let Some(issuer) = &self.issuer {
            config = config.with_issuer(issuer.clone());
        }
        if let Some(jwks_url) = &self.jwks_url {
            config = config.with_jwks_url(jwks_url.clone());
        }

        Ok(config)
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the provider client cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let config = args.cognito_config()?;
    log_startup_args(&args, &config);

    let client = CognitoClient::new(&config).context("Failed to build identity provider client")?;
    let service = Arc::new(AuthService::new(Arc::new(client)));

    let verifier = TokenVerifier::new_remote(
        config.jwks_url(),
        config.issuer(),
        config.client_id().to_string(),
        config.timeout(),
    )
    .await?;
    info!(
        jwks_url = verifier.keyset_url().unwrap_or("static"),
        "token verifier ready"
    );

    let result = api::new(args.port, service, Arc::new(verifier)).await;

    telemetry::shutdown_tracer();

    result
}

fn log_startup_args(args: &Args, config: &CognitoConfig) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("user_pool_id", config.user_pool_id().to_string()),
        ("client_id", config.client_id().to_string()),
        ("client_secret_set", args.client_secret.is_some().to_string()),
        ("region", config.region().to_string()),
        ("idp_endpoint", config.endpoint()),
        ("issuer", config.issuer()),
        ("jwks_url", config.jwks_url()),
        (
            "provider_timeout",
            format!("{}s", config.timeout().as_secs()),
        ),
    ];
    log_entries("Startup configuration", &entries);
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!("{}\n\n{title}:", banner());
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn banner() -> String {
    format!(
        "{} - {} - {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        crate::short_commit(crate::GIT_COMMIT_HASH)
    )
}
