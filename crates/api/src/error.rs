//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed path, query, or body value.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
        };
        metrics::counter!("http_errors_total", "status" => status.as_str().to_owned()).increment(1);

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match &err {
        DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        DomainError::InsufficientInventory { .. }
        | DomainError::InvalidOrderStatus { .. }
        | DomainError::DuplicateInventory { .. }
        | DomainError::Store(StoreError::UniqueViolation { .. }) => {
            (StatusCode::CONFLICT, err.to_string())
        }
        DomainError::InvalidTimeRange { .. }
        | DomainError::SlotNotActive { .. }
        | DomainError::InvalidPrice { .. }
        | DomainError::InvalidQuantity { .. }
        | DomainError::AmountOverflow { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
        DomainError::Store(_) => {
            tracing::error!(error = %err, "internal server error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            )
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}
