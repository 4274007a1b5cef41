use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use gomeetup_core::DomainError;
use gomeetup_infra::{IdentityError, StoreError};

const BASIC_CHALLENGE: &str = r#"Basic realm="Authentication required""#;
const INTERNAL_MESSAGE: &str = "Internal server error";

/// Error returned by every handler; renders as `{ "error", "error_type" }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    error_type: &'static str,
    message: String,
    challenge: bool,
}

impl ApiError {
    fn new(status: StatusCode, error_type: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error_type,
            message: message.into(),
            challenge: false,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", message)
    }

    /// Unexpected failure. The detail is logged, never sent to the client.
    pub fn internal(detail: impl core::fmt::Display) -> Self {
        tracing::error!("internal error: {detail}");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", INTERNAL_MESSAGE)
    }

    fn internal_inconsistency(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!("internal inconsistency: {message}");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_inconsistency",
            message,
        )
    }

    /// Attach a Basic auth challenge when this is a 401.
    pub fn with_basic_challenge(mut self) -> Self {
        self.challenge = self.status == StatusCode::UNAUTHORIZED;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn error_type(&self) -> &'static str {
        self.error_type
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (
            self.status,
            axum::Json(json!({
                "error": self.message,
                "error_type": self.error_type,
            })),
        )
            .into_response();

        if self.challenge {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(BASIC_CHALLENGE),
            );
        }
        response
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidRequest(msg) => ApiError::invalid_request(msg),
            IdentityError::Unauthorized(msg) => ApiError::unauthorized(msg),
            IdentityError::Forbidden(msg) => ApiError::forbidden(msg),
            IdentityError::Conflict(msg) => ApiError::conflict(msg),
            IdentityError::InternalInconsistency(msg) => ApiError::internal_inconsistency(msg),
            IdentityError::Internal(msg) => ApiError::internal(msg),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => ApiError::conflict(err.to_string()),
            other => ApiError::internal(other),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                ApiError::invalid_request(msg)
            }
        }
    }
}
