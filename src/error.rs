//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the error type of the HTTP surface. Each variant
//! maps to a specific HTTP status code and structured JSON error response.
//! Background failures (instance channels, registry lookups) have their
//! own error types and never reach a client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{InstanceId, StatusKey, ViewerId};
use crate::ws::authorization::AuthorizationError;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "instance not tracked: 6f1c…",
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
/// | 2000–2999 | Not Found       | 404 Not Found              |
/// | 3000–3999 | Server          | 500 / 503                  |
/// | 4000–4999 | Identity        | 401 Unauthorized           |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No channel is running for the instance.
    #[error("instance not tracked: {0}")]
    InstanceNotTracked(InstanceId),

    /// Nothing has been reported for this status field yet.
    #[error("status {key} unknown for instance {instance_id}")]
    StatusUnknown {
        /// Instance queried.
        instance_id: InstanceId,
        /// Field queried.
        key: StatusKey,
    },

    /// The viewer has no roles on record.
    #[error("unknown viewer: {0}")]
    UnknownViewer(ViewerId),

    /// The request carries no usable viewer identity.
    #[error("missing or invalid viewer identity")]
    Unauthorized,

    /// The authorization source could not be queried.
    #[error("authorization unavailable: {0}")]
    AuthorizationUnavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InstanceNotTracked(_) => 2001,
            Self::StatusUnknown { .. } => 2002,
            Self::UnknownViewer(_) => 2003,
            Self::Internal(_) => 3000,
            Self::AuthorizationUnavailable(_) => 3001,
            Self::Unauthorized => 4001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::InstanceNotTracked(_) | Self::StatusUnknown { .. } | Self::UnknownViewer(_) => {
                StatusCode::NOT_FOUND
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::AuthorizationUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AuthorizationError> for GatewayError {
    fn from(err: AuthorizationError) -> Self {
        match err {
            AuthorizationError::UnknownViewer(viewer) => Self::UnknownViewer(viewer),
            AuthorizationError::Unavailable(reason) => Self::AuthorizationUnavailable(reason),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        }
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
