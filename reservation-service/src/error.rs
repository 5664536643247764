use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Domain errors raised by the booking operations. Everything raised inside
/// a transaction causes a full rollback before it propagates.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("database error")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error")]
    Pool(#[from] bb8::RunError<diesel_async::pooled_connection::PoolError>),
}

impl BookingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BookingError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            BookingError::NotFound(_) => StatusCode::NOT_FOUND,
            BookingError::Conflict(_) => StatusCode::CONFLICT,
            BookingError::InvalidOperation(_) => StatusCode::CONFLICT,
            BookingError::Database(_) | BookingError::Pool(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            BookingError::InvalidInput(_) => "INVALID_INPUT",
            BookingError::NotFound(_) => "NOT_FOUND",
            BookingError::Conflict(_) => "CONFLICT",
            BookingError::InvalidOperation(_) => "INVALID_OPERATION",
            BookingError::Database(_) => "DATABASE_ERROR",
            BookingError::Pool(_) => "POOL_ERROR",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Infrastructure failures are logged with detail but reported to the
        // client with a generic message.
        let message = match &self {
            BookingError::Database(e) => {
                error!(error = ?e, "database error");
                "a database error occurred".to_string()
            }
            BookingError::Pool(e) => {
                error!(error = ?e, "connection pool error");
                "a database error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorEnvelope {
            error: ErrorBody {
                code: self.code(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}
