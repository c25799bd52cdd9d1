//! Application error type and its HTTP mapping.

use axum::{
    Json,
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use shelf_assets::AssetError;
use shelf_insights::InsightError;
use shelf_types::api::ErrorResponse;

pub type ApiResult<T> = Result<T, ApiError>;

const FILE_TOO_LARGE: &str = "File too large. Maximum size is 5MB.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    /// A collaborator is not configured; retrying will not help.
    #[error("{0}")]
    Unavailable(String),

    /// A collaborator failed; the message is safe to show.
    #[error("{0}")]
    Upstream(String),

    /// Details are logged, never sent.
    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidCredentials => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal(detail) => error!("Internal error: {}", detail),
            Self::Upstream(detail) => warn!("Upstream failure: {}", detail),
            _ => {}
        }
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (self.status(), body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(format!("{e:#}"))
    }
}

impl From<AssetError> for ApiError {
    fn from(e: AssetError) -> Self {
        match e {
            AssetError::InvalidType(_) | AssetError::TooLarge | AssetError::Stream(_) => {
                ApiError::Validation(e.to_string())
            }
            AssetError::DownloadFailed(_)
            | AssetError::Timeout
            | AssetError::NonSuccessStatus(_) => ApiError::Upstream(e.to_string()),
            AssetError::Io(e) => ApiError::Internal(format!("asset storage: {e}")),
        }
    }
}

impl From<InsightError> for ApiError {
    fn from(e: InsightError) -> Self {
        match e {
            InsightError::ProviderUnavailable => ApiError::Unavailable(e.to_string()),
            InsightError::GenerationFailed(_) => ApiError::Upstream(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::Validation(e.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(e: MultipartRejection) -> Self {
        ApiError::Validation(e.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::Validation(FILE_TOO_LARGE.into())
        } else {
            ApiError::Validation(e.body_text())
        }
    }
}
