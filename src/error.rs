//! Relay error types with HTTP status code mapping.
//!
//! [`RelayError`] is the central error type for the relay. Collaborator
//! failures (bus, presence store, identity provider) are funnelled into it,
//! and the read-only HTTP surface maps each variant to a status code and a
//! structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid request: channel name must not be empty",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                |
/// |-----------|-----------------|----------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request            |
/// | 2000–2999 | Not Found/Auth  | 404 Not Found / 401        |
/// | 3000–3999 | Server          | 500 Internal Server Error  |
/// | 5000–5999 | Upstream        | 502 Bad Gateway            |
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Session token was rejected by the identity provider.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Identity provider entity (user, group) does not exist.
    #[error("identity not found: {0}")]
    IdentityNotFound(String),

    /// Identity provider was unreachable or answered unexpectedly.
    #[error("identity provider error: {0}")]
    IdentityProvider(String),

    /// Broadcast bus failure (publish or subscribe).
    #[error("bus error: {0}")]
    Bus(String),

    /// Presence store failure.
    #[error("presence store error: {0}")]
    Presence(String),

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RelayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::Serialization(_) => 1002,
            Self::IdentityNotFound(_) => 2002,
            Self::Unauthenticated(_) => 2401,
            Self::Bus(_) => 3001,
            Self::Presence(_) => 3002,
            Self::IdentityProvider(_) => 5001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::Serialization(_) => StatusCode::BAD_REQUEST,
            Self::IdentityNotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Bus(_) | Self::Presence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IdentityProvider(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<redis::RedisError> for RelayError {
    fn from(err: redis::RedisError) -> Self {
        Self::Bus(err.to_string())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn identity_not_found_maps_to_404() {
        let err = RelayError::IdentityNotFound("group g-1".to_string());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), 2002);
        assert_eq!(err.to_string(), "identity not found: group g-1");
    }

    #[test]
    fn upstream_identity_failure_is_bad_gateway() {
        let err = RelayError::IdentityProvider("timeout".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn serde_errors_convert() {
        let Err(json_err) = serde_json::from_str::<serde_json::Value>("{") else {
            panic!("expected a parse error");
        };
        let err = RelayError::from(json_err);
        assert_eq!(err.error_code(), 1002);
    }

    #[test]
    fn into_response_carries_status() {
        let response = RelayError::Unauthenticated("expired".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
