use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::constants::{ERR_DUPLICATE_SUBMISSION, ERR_UNAUTHORIZED, ERR_UPLOAD_IN_PROGRESS};
use crate::github::GitHubError;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    GitHub(#[from] GitHubError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid form data: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{}", ERR_UNAUTHORIZED)]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{}", ERR_DUPLICATE_SUBMISSION)]
    DuplicateSubmission,

    #[error("Upload limit reached. Please wait {remaining_minutes} minutes before uploading again.")]
    CooldownActive { remaining_minutes: i64 },

    #[error("{}", ERR_UPLOAD_IN_PROGRESS)]
    UploadInProgress,

    #[error("Upload exceeds maximum allowed size")]
    PayloadTooLarge,
}

impl AppError {
    /// HTTP status this error maps to
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::GitHub(_) | AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            // 413 when the body limit was hit mid-stream, 400 otherwise
            AppError::Multipart(e) => e.status(),
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateSubmission => StatusCode::CONFLICT,
            AppError::CooldownActive { .. } | AppError::UploadInProgress => {
                StatusCode::TOO_MANY_REQUESTS
            }
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// Message relayed to the caller, either as a JSON body or a stream error frame
    pub fn client_message(&self) -> String {
        match self {
            AppError::InvalidInput(msg) => msg.clone(),
            AppError::Serialization(_) => "Internal server error".to_string(),
            AppError::Multipart(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                AppError::PayloadTooLarge.to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Implement IntoResponse to convert AppError into HTTP responses
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            AppError::GitHub(e) => tracing::error!("GitHub error: {}", e),
            AppError::Serialization(e) => tracing::error!("Serialization error: {:?}", e),
            _ => {}
        }

        let body = Json(json!({
            "error": self.client_message()
        }));

        (status, body).into_response()
    }
}

/// Result type alias for application results
pub type Result<T> = std::result::Result<T, AppError>;
