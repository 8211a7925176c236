use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use heroforge_shared::constants::{
    BACKEND_UNREACHABLE_ERROR, IMAGE_TOO_SMALL_ERROR, NON_IMAGE_RESPONSE_ERROR,
};
use heroforge_shared::generation::{ErrorResponse, RequestError};
use heroforge_shared::rate_limit::{RateLimitError, RATE_LIMIT_ERROR, RATE_LIMIT_REMAINING_HEADER};
use heroforge_shared::wheel::SpinRejected;
use thiserror::Error;

use crate::generator::GenerationError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("rate limit exceeded")]
    RateLimited { remaining: u32 },
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("{0}")]
    Internal(&'static str),
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<RateLimitError> for ApiError {
    fn from(err: RateLimitError) -> Self {
        ApiError::RateLimited {
            remaining: err.remaining,
        }
    }
}

impl From<SpinRejected> for ApiError {
    fn from(err: SpinRejected) -> Self {
        ApiError::Conflict(err.to_string())
    }
}

fn message(error: impl Into<String>) -> ErrorResponse {
    ErrorResponse {
        error: error.into(),
        details: None,
        content_type: None,
    }
}

fn generation_body(err: GenerationError) -> ErrorResponse {
    match err {
        GenerationError::Unreachable(source) => ErrorResponse {
            details: Some(source.to_string()),
            ..message(BACKEND_UNREACHABLE_ERROR)
        },
        GenerationError::NotAnImage { content_type, body } => ErrorResponse {
            error: NON_IMAGE_RESPONSE_ERROR.to_string(),
            details: Some(body),
            content_type: Some(content_type),
        },
        GenerationError::Status { status, reason } => {
            message(format!("Image generation API error: {} {}", status, reason).trim_end().to_string())
        }
        GenerationError::TooSmall(_) => message(IMAGE_TOO_SMALL_ERROR),
        GenerationError::Malformed(reason) => ErrorResponse {
            details: Some(reason),
            ..message("Image generation failed. Server returned an unreadable image.")
        },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, message(msg)),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, message(msg)),
            ApiError::RateLimited { remaining } => {
                let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(message(RATE_LIMIT_ERROR))).into_response();
                response.headers_mut().insert(
                    HeaderName::from_static(RATE_LIMIT_REMAINING_HEADER),
                    HeaderValue::from(remaining),
                );
                return response;
            }
            ApiError::Generation(err) => (StatusCode::BAD_GATEWAY, generation_body(err)),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, message(msg)),
        };

        let mut response = (status, Json(body)).into_response();
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        response
    }
}
