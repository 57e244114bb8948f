use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Invalid or expired code")]
    InvalidCode,

    #[error("Authorization token required")]
    Unauthorized,

    #[error("Admin permission required")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Cannot move status from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Record was modified concurrently, try again")]
    Conflict,

    #[error("Random source unavailable: {0}")]
    RandomSource(#[from] rand::Error),

    #[error("Storage error: {0}")]
    Persistence(#[from] redis::RedisError),

    #[error("Internal error: {0}")]
    InternalError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl AppError {
    pub fn internal(message: impl Into<String>) -> Self {
        let message: String = message.into();
        AppError::InternalError(message.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::MalformedPayload { .. } => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::InvalidCode | AppError::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::InvalidTransition { .. } | AppError::Conflict => StatusCode::CONFLICT,
            AppError::RandomSource { .. }
            | AppError::Persistence { .. }
            | AppError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
