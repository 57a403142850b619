//! API error taxonomy and its single translation into HTTP responses.
//!
//! Boundary validation errors (location shape, session id format) are built
//! directly by handlers; pipeline errors bubble up as [`ApiError`] and are
//! mapped to a status plus a stable string code exactly once, in the
//! [`IntoResponse`] impl.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::generator::GenerateError;

/// Everything a handler or the pipeline can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("location is required")]
    MissingLocation,

    #[error("invalid location: {0}")]
    InvalidLocation(String),

    #[error("invalid session id format: {0}")]
    InvalidSessionId(String),

    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error("generated instruction failed validation: {0}")]
    InvalidInstruction(String),

    #[error("generation backend unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("too many requests")]
    RateLimitExceeded {
        /// Seconds until the oldest request leaves the window.
        retry_after: u64,
    },

    /// Reserved: no authentication layer is wired today, but the code is
    /// part of the stable API surface.
    #[error("authentication required")]
    Unauthorized,

    #[error("internal error: {detail}")]
    Internal {
        detail: String,
        /// Whether the body may carry the raw detail. Decided by the caller
        /// from its environment; the response hides detail when false.
        expose_detail: bool,
    },
}

impl From<GenerateError> for ApiError {
    fn from(err: GenerateError) -> Self {
        match err {
            GenerateError::Unavailable(detail) => Self::GenerationUnavailable(detail),
            GenerateError::Invalid(detail) => Self::InvalidInstruction(detail),
        }
    }
}

/// JSON body for every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl ApiError {
    /// Internal error with a raw detail, exposed in the body only when
    /// `expose_detail` is set.
    pub fn internal(detail: impl Into<String>, expose_detail: bool) -> Self {
        Self::Internal {
            detail: detail.into(),
            expose_detail,
        }
    }

    /// Stable string code for this error kind.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingLocation => "MISSING_LOCATION",
            Self::InvalidLocation(_) => "INVALID_LOCATION",
            Self::InvalidSessionId(_) => "INVALID_SESSION_ID",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::InvalidInstruction(_) => "INVALID_INSTRUCTION",
            Self::GenerationUnavailable(_) => "GENERATION_UNAVAILABLE",
            Self::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// HTTP status for this error kind.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingLocation | Self::InvalidLocation(_) | Self::InvalidSessionId(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidInstruction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::GenerationUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        let (error, details, retry_after) = match self {
            Self::MissingLocation => ("Location is required".to_string(), None, None),
            Self::InvalidLocation(detail) => (detail.clone(), None, None),
            Self::InvalidSessionId(_) => ("Invalid session ID format".to_string(), None, None),
            Self::SessionNotFound(_) => ("Session not found".to_string(), None, None),
            Self::InvalidInstruction(detail) => (
                "Generated instruction failed validation".to_string(),
                Some(detail.clone()),
                None,
            ),
            Self::GenerationUnavailable(detail) => (
                "Generation service temporarily unavailable".to_string(),
                Some(detail.clone()),
                None,
            ),
            Self::RateLimitExceeded { retry_after } => {
                ("Too many requests".to_string(), None, Some(*retry_after))
            }
            Self::Unauthorized => ("Authentication required".to_string(), None, None),
            Self::Internal {
                detail,
                expose_detail,
            } => (
                "Internal server error".to_string(),
                expose_detail.then(|| detail.clone()),
                None,
            ),
        };

        ErrorBody {
            error,
            code: self.code(),
            details,
            retry_after,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "Request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}
