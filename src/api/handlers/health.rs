use crate::{GIT_COMMIT_HASH, guard::TokenVerifier, short_commit};
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    jwks: String,
}

/// `<name>:<version>:<short commit>`
fn app_header() -> Option<HeaderValue> {
    let value = format!(
        "{}:{}:{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(GIT_COMMIT_HASH)
    );
    HeaderValue::from_str(&value)
        .map_err(|err| debug!(error = %err, "invalid X-App header"))
        .ok()
}

#[utoipa::path(
    get,
    path = "/health",
    responses (
        (status = 200, description = "Signing keys are reachable", body = Health),
        (status = 503, description = "Signing keys could not be fetched", body = Health)
    ),
    tag = "health",
)]
/// Report build info and whether the user pool JWKS can be fetched.
pub async fn health(method: Method, verifier: Extension<Arc<TokenVerifier>>) -> Response {
    let jwks = verifier.dependency_status().await;

    let status = if jwks.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let mut response = if method == Method::GET {
        let health = Health {
            commit: GIT_COMMIT_HASH.to_string(),
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            jwks: jwks.as_str().to_string(),
        };
        (status, Json(health)).into_response()
    } else {
        (status, Body::empty()).into_response()
    };

    if let Some(value) = app_header() {
        response.headers_mut().insert("x-app", value);
    }
    response
}
