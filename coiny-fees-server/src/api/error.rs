use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use coiny_fees::FeeError;
use thiserror::Error;

use crate::service::ServiceError;

/// API-specific error types with proper HTTP status code mapping
#[derive(Error, Debug)]
pub enum ApiError {
    /// Bad request - client error (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Upstream publisher refused the post (502)
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    /// Service unavailable - temporary issue (503)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error - unexpected failure (500)
    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, message).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::FeeError(fee_err) => match fee_err {
                FeeError::InvalidInput(msg) => ApiError::BadRequest(msg),
                // Both providers down is a temporary issue
                FeeError::AllSourcesUnavailable | FeeError::AllSourcesMissing { .. } => {
                    ApiError::ServiceUnavailable(fee_err.to_string())
                }
                _ => ApiError::InternalError(format!("Fee error: {fee_err}")),
            },
            ServiceError::PersistenceError(err) => {
                ApiError::InternalError(format!("Storage error: {err}"))
            }
            ServiceError::PublishError(err) => ApiError::BadGateway(err.to_string()),
            ServiceError::NotReady => {
                ApiError::ServiceUnavailable("No fee estimates available yet".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::PersistenceError;

    fn status_of(err: ServiceError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(ServiceError::FeeError(FeeError::AllSourcesUnavailable)),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(ServiceError::FeeError(FeeError::invalid_input("target 0"))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(ServiceError::NotReady), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status_of(ServiceError::PersistenceError(PersistenceError::LockPoisoned)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
