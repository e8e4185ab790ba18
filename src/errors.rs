use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::services::bookings::BookingError;
use crate::services::catalog::CatalogError;
use crate::services::payments::WithdrawalError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),

    #[error("{0}")]
    Validation(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(e: BookingError) -> Self {
        match e {
            BookingError::Storage(err) => AppError::Internal(err),
            BookingError::ServiceNotFound => AppError::NotFound("service not found".to_string()),
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::Storage(err) => AppError::Internal(err),
            CatalogError::NotOwner => {
                AppError::Forbidden("service does not belong to this vendor".to_string())
            }
        }
    }
}

impl From<WithdrawalError> for AppError {
    fn from(e: WithdrawalError) -> Self {
        match e {
            WithdrawalError::Storage(err) => AppError::Internal(err),
            other => AppError::Validation(other.to_string()),
        }
    }
}
