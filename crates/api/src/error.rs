//! API error types with HTTP response mapping.

use application::ApplicationError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),

    /// Command execution error.
    #[error(transparent)]
    Application(#[from] ApplicationError),

    /// Internal server error.
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Application(err) => application_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn application_error_to_response(err: ApplicationError) -> (StatusCode, String) {
    match &err {
        ApplicationError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        ApplicationError::AlreadyExists(_) => (StatusCode::CONFLICT, err.to_string()),
        ApplicationError::BlockedBrand(_) | ApplicationError::Domain(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        ApplicationError::Storage(_) => {
            tracing::error!(error = %err, "storage failure");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::AggregateId;
    use domain::{BrandId, PartnershipError};
    use storage::StorageError;

    fn status(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_application_errors_map_to_status_codes() {
        let id = AggregateId::new();
        assert_eq!(
            status(ApplicationError::NotFound(id).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(ApplicationError::AlreadyExists(id).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(ApplicationError::BlockedBrand(BrandId::new()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(ApplicationError::Domain(PartnershipError::InvalidCommissionRate(-1.0)).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(ApplicationError::Storage(StorageError::Unavailable("down".into())).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
