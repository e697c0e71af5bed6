use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;
use tracing::error;

use crate::types::ErrorResponse;

/// Errors surfaced to HTTP callers. Each variant carries the message the UI
/// shows next to its retry button.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid input")]
    InvalidInput(Vec<String>),

    #[error("{0}")]
    NotFound(String),

    #[error("Too many requests")]
    RateLimited,

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("{message}")]
    Upstream { status: StatusCode, message: String },

    #[error("No content could be scraped from the provided URLs")]
    NoContent,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn upstream(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError::Upstream {
            status,
            message: message.into(),
        }
    }

    /// Upstream failure surfaced with the upstream status and its reason phrase.
    pub fn from_upstream(status: reqwest::StatusCode) -> Self {
        let status = upstream_status(status);
        ApiError::upstream(status, status.canonical_reason().unwrap_or("Upstream request failed"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upstream { status, .. } => *status,
            ApiError::NoContent => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed ({}): {:#}", status, self);
        }
        let body = match self {
            ApiError::InvalidInput(details) => ErrorResponse {
                error: "Invalid input".to_string(),
                details: Some(details),
            },
            // Internal details stay in the log.
            ApiError::Internal(_) => ErrorResponse::new("An unexpected error occurred"),
            other => ErrorResponse::new(other.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// reqwest and axum depend on different `http` majors; statuses cross over
/// by their numeric code.
pub fn upstream_status(status: reqwest::StatusCode) -> StatusCode {
    StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            ApiError::NotConfigured("GOOGLE_API_KEY").status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::upstream(StatusCode::FORBIDDEN, "nope").status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ApiError::NoContent.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_from_upstream_uses_reason_phrase() {
        let err = ApiError::from_upstream(reqwest::StatusCode::UNAUTHORIZED);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "Unauthorized");
    }

    #[test]
    fn test_not_configured_message() {
        assert_eq!(
            ApiError::NotConfigured("NEWS_API_KEY").to_string(),
            "NEWS_API_KEY is not configured"
        );
    }
}
