//! HTTP error mapping for the relay service.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use solrelay::RelayError;

/// Errors surfaced by the HTTP layer.
///
/// Validation and verification failures map to 400; infrastructure failures
/// during verification to 503 (client should retry); disbursement failures
/// to 500 (operator-actionable, never silently retried); the end-to-end
/// deadline to 504.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request body is not valid JSON.
    #[error("Malformed JSON in request body")]
    MalformedJson,
    /// The body is JSON but does not carry a sender string and numeric amount.
    #[error("Invalid sender or amount")]
    InvalidBody,
    /// A typed relay failure.
    #[error("{0}")]
    Relay(#[from] RelayError),
    /// The handler task itself failed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Maps an axum JSON rejection to the relay's 400 messages.
    #[must_use]
    pub fn from_rejection(rejection: &JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonSyntaxError(_) => Self::MalformedJson,
            _ => Self::InvalidBody,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::MalformedJson | Self::InvalidBody => StatusCode::BAD_REQUEST,
            Self::Relay(e) => match e {
                RelayError::Validation(_) | RelayError::PaymentNotVerified => {
                    StatusCode::BAD_REQUEST
                }
                RelayError::AlreadyConsumed(_) => StatusCode::CONFLICT,
                RelayError::VerificationInfrastructure(_) => StatusCode::SERVICE_UNAVAILABLE,
                RelayError::Disbursement(_) => StatusCode::INTERNAL_SERVER_ERROR,
                RelayError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            },
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
