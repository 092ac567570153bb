//! HTTP error surface

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use types::errors::{ConfirmationError, OrderError};

/// Everything a handler can fail with, mapped onto status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Confirmation(#[from] ConfirmationError),

    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Order(err) => match err {
                OrderError::InvalidInput { .. } => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
                OrderError::LimitExceeded { .. } => (StatusCode::CONFLICT, "LIMIT_EXCEEDED"),
                OrderError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                OrderError::Immutable { .. } => (StatusCode::CONFLICT, "IMMUTABLE"),
                OrderError::Internal(_) => (StatusCode::SERVICE_UNAVAILABLE, "TRY_AGAIN"),
            },
            ApiError::Confirmation(err) => match err {
                ConfirmationError::UnknownKey { .. } => (StatusCode::NOT_FOUND, "UNKNOWN_KEY"),
                ConfirmationError::Expired => (StatusCode::GONE, "EXPIRED"),
                ConfirmationError::NotParty => (StatusCode::FORBIDDEN, "NOT_PARTY"),
                ConfirmationError::Duplicate => (StatusCode::CONFLICT, "DUPLICATE"),
                ConfirmationError::Unparseable(_) => (StatusCode::BAD_REQUEST, "UNPARSEABLE"),
            },
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
        };

        let body = Json(json!({
            "error": code,
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let response =
            ApiError::Order(OrderError::invalid("price", "must be positive")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_mapping() {
        let response = ApiError::Order(OrderError::NotFound).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_expired_confirmation_is_gone() {
        let response = ApiError::Confirmation(ConfirmationError::Expired).into_response();
        assert_eq!(response.status(), StatusCode::GONE);
    }
}
