use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use ledger::LedgerError;
use tracing::{error, warn};

use crate::schemas::ErrorResponse;

/// HTTP-facing wrapper around engine errors. Converts the engine's error
/// taxonomy into status codes and a JSON body.
#[derive(Debug)]
pub struct ApiError(pub LedgerError);

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        ApiError(e)
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(e: sea_orm::DbErr) -> Self {
        ApiError(LedgerError::Database(e))
    }
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError(LedgerError::Validation(message.into()))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError(LedgerError::NotFound(message.into()))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError(LedgerError::Conflict(message.into()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            LedgerError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            LedgerError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            LedgerError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            LedgerError::ExternalService(_) => {
                (StatusCode::BAD_GATEWAY, "RATE_SOURCE_UNAVAILABLE")
            }
            LedgerError::Invariant(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INVARIANT_VIOLATION")
            }
            LedgerError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
        };

        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }

        let body = ErrorResponse {
            error: self.0.to_string(),
            code: code.to_string(),
            success: false,
        };
        (status, Json(body)).into_response()
    }
}
