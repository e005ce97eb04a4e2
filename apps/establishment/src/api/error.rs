//! # API Errors
//!
//! Maps core errors onto HTTP status codes with a `{ "error": ... }` body.

use super::types::ErrorResponse;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use establishment_core::EstablishmentError;

/// Error returned by every handler.
#[derive(Debug)]
pub struct ApiError(pub EstablishmentError);

impl From<EstablishmentError> for ApiError {
    fn from(err: EstablishmentError) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// Status code for the wrapped error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            EstablishmentError::NotFound(_) | EstablishmentError::EndpointNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            EstablishmentError::AlreadyExists(_) => StatusCode::CONFLICT,
            EstablishmentError::InvalidRelationship(_)
            | EstablishmentError::ValidationError(_) => StatusCode::BAD_REQUEST,
            EstablishmentError::InvalidCredentials
            | EstablishmentError::NoSession
            | EstablishmentError::Expired => StatusCode::UNAUTHORIZED,
            EstablishmentError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            EstablishmentError::StoreError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            // Raw store messages stay in the log.
            EstablishmentError::StoreError(detail) => {
                tracing::error!(error = %detail, "Store failure");
                "Internal server error".to_string()
            }
            EstablishmentError::Timeout => {
                tracing::warn!("Request deadline exceeded");
                self.0.to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            (EstablishmentError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                EstablishmentError::EndpointNotFound("x".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                EstablishmentError::AlreadyExists("x".into()),
                StatusCode::CONFLICT,
            ),
            (
                EstablishmentError::InvalidRelationship("x".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                EstablishmentError::ValidationError("x".into()),
                StatusCode::BAD_REQUEST,
            ),
            (EstablishmentError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (EstablishmentError::NoSession, StatusCode::UNAUTHORIZED),
            (EstablishmentError::Expired, StatusCode::UNAUTHORIZED),
            (EstablishmentError::Timeout, StatusCode::SERVICE_UNAVAILABLE),
            (
                EstablishmentError::StoreError("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).status(), expected);
        }
    }

    #[test]
    fn store_errors_are_not_echoed() {
        let response =
            ApiError(EstablishmentError::StoreError("secret path".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
