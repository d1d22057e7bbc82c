//! API error handling

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

use domain_ledger::LedgerError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid request body")]
    InvalidFields(Vec<String>),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message, details) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", "Unauthorized".to_string(), None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg, None),
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg, None),
            ApiError::InvalidFields(fields) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Invalid request body".to_string(),
                Some(fields),
            ),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(msg) => ApiError::Validation(msg),
            e @ LedgerError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            e @ LedgerError::AlreadyVoided(_) => ApiError::Conflict(e.to_string()),
            e @ LedgerError::InventoryReconciliation(_) => ApiError::Conflict(e.to_string()),
            e @ (LedgerError::Money(_) | LedgerError::Store(_)) => {
                error!(error = %e, "Ledger operation failed");
                ApiError::Internal("The ledger could not complete the operation".to_string())
            }
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut details: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => format!("{}: {}", field, message),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect();
        details.sort();
        if details.is_empty() {
            details.push(errors.to_string());
        }
        ApiError::InvalidFields(details)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::PortError;

    fn status_of(err: LedgerError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_ledger_errors_map_to_statuses() {
        assert_eq!(status_of(LedgerError::validation("bad")), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_of(LedgerError::not_found("Customer", "x")), StatusCode::NOT_FOUND);
        assert_eq!(status_of(LedgerError::AlreadyVoided("BILL-1".into())), StatusCode::CONFLICT);
        assert_eq!(status_of(LedgerError::InventoryReconciliation(vec![])), StatusCode::CONFLICT);
        assert_eq!(
            status_of(LedgerError::Store(PortError::connection("down"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
