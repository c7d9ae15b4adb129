use crate::auth::{AuthError, ValidationError};
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

/// Error body shared by every non-2xx response.
#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub message: String,
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            status_code: self.status.as_u16(),
            message: self.message,
            error: self
                .status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        debug!(code = err.code().unwrap_or("-"), "identity provider call failed");
        Self::bad_request(err.message())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::bad_request(err.to_string())
    }
}

// Malformed JSON, wrong content type and missing fields are all client errors.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn renders_uniform_body() -> anyhow::Result<()> {
        let response = ApiError::bad_request("User already exists").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body: ErrorBody = serde_json::from_slice(&bytes)?;
        assert_eq!(
            body,
            ErrorBody {
                status_code: 400,
                message: "User already exists".to_string(),
                error: "Bad Request".to_string(),
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn unauthorized_uses_same_shape() -> anyhow::Result<()> {
        let response = ApiError::unauthorized("token expired").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body: serde_json::Value = serde_json::from_slice(&bytes)?;
        assert_eq!(body["statusCode"], 401);
        assert_eq!(body["error"], "Unauthorized");
        assert_eq!(body["message"], "token expired");
        Ok(())
    }

    #[test]
    fn validation_error_is_bad_request() {
        let err = ApiError::from(ValidationError::InvalidEmail);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "email must be an email");
    }
}
