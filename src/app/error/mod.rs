use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::email::EmailError;

mod schema;

/// Result type of every waitlist handler.
pub type AppResult<T, E = AppError> = std::result::Result<T, E>;

/// A common error type that can be used throughout the API.
///
/// Can be returned in a `Result` from an API handler function. Every variant
/// maps to a status code and a `{"success": false, "message": ..}` body.
/// Unexpected errors are logged with their full chain and reported with a
/// generic message.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Email(#[from] EmailError),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Email(_) | Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match self {
            Self::Validation(ref s) | Self::Conflict(ref s) | Self::NotFound(ref s) => {
                tracing::info!(detail = %s, "request rejected");
                s.to_owned()
            }
            Self::Email(ref e) => {
                tracing::error!(detail = ?e, "email integration failed");
                e.to_string()
            }
            Self::Unexpected(ref e) => {
                tracing::error!("{:?}", e);
                "Internal server error".to_owned()
            }
        };

        (
            self.status_code(),
            Json(schema::Error {
                success: false,
                message,
            }),
        )
            .into_response()
    }
}
