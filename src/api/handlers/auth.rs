//! Auth endpoints. Each handler validates the body, forwards to the
//! [`AuthService`] once, and returns the provider result as-is.

use crate::{
    api::error::{ApiError, ErrorBody},
    auth::{
        AuthService, AuthenticateRequest, ConfirmRequest, RefreshRequest, RegisterRequest,
        ResendCodeRequest, Validate,
    },
    guard::AuthenticatedUser,
    idp::{ConfirmationResult, DispatchResult, Session, UserHandle},
};
use axum::{
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;

type Body<T> = Result<Json<T>, JsonRejection>;

/// Parse and validate a request body.
fn accept<T: Validate>(payload: Body<T>) -> Result<T, ApiError> {
    let Json(request) = payload?;
    request.validate()?;
    Ok(request)
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses (
        (status = 201, description = "User created, confirmation code sent", body = UserHandle),
        (status = 400, description = "Invalid input or rejected by the identity provider", body = ErrorBody),
    ),
    tag = "auth",
)]
pub async fn register(
    service: Extension<Arc<AuthService>>,
    payload: Body<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request = accept(payload)?;
    let handle = service.register(&request).await?;
    Ok((StatusCode::CREATED, Json(handle)))
}

#[utoipa::path(
    post,
    path = "/auth/authenticate",
    request_body = AuthenticateRequest,
    responses (
        (status = 201, description = "Authenticated", body = Session),
        (status = 400, description = "Invalid input or rejected by the identity provider", body = ErrorBody),
    ),
    tag = "auth",
)]
pub async fn authenticate(
    service: Extension<Arc<AuthService>>,
    payload: Body<AuthenticateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request = accept(payload)?;
    let session = service.authenticate(&request).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

#[utoipa::path(
    post,
    path = "/auth/confirm",
    request_body = ConfirmRequest,
    responses (
        (status = 201, description = "Registration confirmed", body = ConfirmationResult),
        (status = 400, description = "Invalid input or rejected by the identity provider", body = ErrorBody),
    ),
    tag = "auth",
)]
pub async fn confirm(
    service: Extension<Arc<AuthService>>,
    payload: Body<ConfirmRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request = accept(payload)?;
    let result = service.confirm(&request).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

#[utoipa::path(
    post,
    path = "/auth/resendCode",
    request_body = ResendCodeRequest,
    responses (
        (status = 201, description = "Confirmation code sent again", body = DispatchResult),
        (status = 400, description = "Invalid input or rejected by the identity provider", body = ErrorBody),
    ),
    tag = "auth",
)]
pub async fn resend_code(
    service: Extension<Arc<AuthService>>,
    payload: Body<ResendCodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request = accept(payload)?;
    let result = service.resend_code(&request).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses (
        (status = 201, description = "Session refreshed", body = Session),
        (status = 400, description = "Invalid input or rejected by the identity provider", body = ErrorBody),
    ),
    tag = "auth",
)]
pub async fn refresh(
    service: Extension<Arc<AuthService>>,
    payload: Body<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request = accept(payload)?;
    let session = service.refresh(&request).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    responses (
        (status = 200, description = "Claims of the verified bearer token", body = AuthenticatedUser),
        (status = 401, description = "Missing, malformed, expired or invalid bearer token", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "auth",
)]
/// Return the identity attached by the bearer guard.
pub async fn me(Extension(user): Extension<AuthenticatedUser>) -> Json<AuthenticatedUser> {
    Json(user)
}
