//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::registry::domain::TransitionError;
use crate::registry::ports::{AuthError, StoreError, ValidatorError};
use crate::registry::services::RegistryServiceError;

/// JSON body carried by every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable failure description.
    pub error: String,
}

/// API-level error, one variant per HTTP status the registry emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Validation failures, no-op transitions, malformed input.
    BadRequest(String),
    /// The Authorization header is missing entirely.
    MissingAuthorization,
    /// The bearer token is malformed, invalid, or expired.
    Unauthorized(String),
    /// The token lacks the required permission.
    Forbidden(String),
    /// No matching record.
    NotFound(String),
    /// Storage or infrastructure failure. The detail is logged, not sent.
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::MissingAuthorization => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Authorization header is required".to_owned(),
            ),
            Self::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            Self::Forbidden(message) => (StatusCode::FORBIDDEN, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_owned(),
            ),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound("Server not found".to_owned()),
            StoreError::Conflict(message) | StoreError::Invalid(message) => {
                Self::BadRequest(message)
            }
            StoreError::Internal(source) => {
                error!(error = %source, "store failure");
                Self::Internal
            }
        }
    }
}

impl From<RegistryServiceError> for ApiError {
    fn from(err: RegistryServiceError) -> Self {
        match err {
            RegistryServiceError::Store(store) => Self::from(store),
            RegistryServiceError::Validation(ValidatorError::Internal(source)) => {
                error!(error = %source, "descriptor validator failure");
                Self::Internal
            }
            RegistryServiceError::Validation(rejection) => Self::BadRequest(rejection.to_string()),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken => {
                Self::Unauthorized("Invalid or expired token".to_owned())
            }
            AuthError::Internal(source) => {
                error!(error = %source, "token verifier failure");
                Self::Internal
            }
        }
    }
}
