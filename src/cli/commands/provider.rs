use clap::{Arg, Command};

pub const ARG_USER_POOL_ID: &str = "user-pool-id";
pub const ARG_CLIENT_ID: &str = "client-id";
pub const ARG_CLIENT_SECRET: &str = "client-secret";
pub const ARG_REGION: &str = "region";
pub const ARG_IDP_ENDPOINT: &str = "idp-endpoint";
pub const ARG_JWKS_URL: &str = "jwks-url";
pub const ARG_ISSUER: &str = "issuer";
pub const ARG_PROVIDER_TIMEOUT_SECONDS: &str = "provider-timeout-seconds";

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_user_pool_args(command);
    with_endpoint_args(command)
}

fn with_user_pool_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_USER_POOL_ID)
                .long(ARG_USER_POOL_ID)
                .help("Cognito user pool id, example: us-east-1_AbCdEfGhI")
                .env("AWS_COGNITO_USER_POOL_ID")
                .required(true),
        )
        .arg(
            Arg::new(ARG_CLIENT_ID)
                .long(ARG_CLIENT_ID)
                .help("Cognito app client id")
                .env("AWS_COGNITO_CLIENT_ID")
                .required(true),
        )
        .arg(
            Arg::new(ARG_CLIENT_SECRET)
                .long(ARG_CLIENT_SECRET)
                .help("Cognito app client secret, only for clients created with one")
                .env("AWS_COGNITO_CLIENT_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_REGION)
                .long(ARG_REGION)
                .help("AWS region (default: prefix of the user pool id)")
                .env("AWS_REGION"),
        )
}

fn with_endpoint_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_IDP_ENDPOINT)
                .long(ARG_IDP_ENDPOINT)
                .help("Identity provider endpoint (default: https://cognito-idp.<region>.amazonaws.com/)")
                .env("IDP_GATEWAY_IDP_ENDPOINT"),
        )
        .arg(
            Arg::new(ARG_ISSUER)
                .long(ARG_ISSUER)
                .help("Expected token issuer (default: https://cognito-idp.<region>.amazonaws.com/<pool>)")
                .env("IDP_GATEWAY_ISSUER"),
        )
        .arg(
            Arg::new(ARG_JWKS_URL)
                .long(ARG_JWKS_URL)
                .help("JWKS URL used to verify bearer tokens (default: <issuer>/.well-known/jwks.json)")
                .env("IDP_GATEWAY_JWKS_URL"),
        )
        .arg(
            Arg::new(ARG_PROVIDER_TIMEOUT_SECONDS)
                .long(ARG_PROVIDER_TIMEOUT_SECONDS)
                .help("Timeout for each identity provider call in seconds")
                .env("IDP_GATEWAY_PROVIDER_TIMEOUT_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
