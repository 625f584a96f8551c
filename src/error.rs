use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

// Errors raised by the limiter itself
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LimiterError {
    #[error("caller key must not be empty")]
    InvalidKey,

    #[error("invalid limiter configuration: {0}")]
    InvalidConfig(String),
}

// Errors surfaced over HTTP
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("No bucket tracked for key {0}")]
    NotFound(String),

    #[error("Rate limit exceeded, retry after {retry_after_secs:.3} seconds")]
    RateLimited { retry_after_secs: f64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<LimiterError> for ApiError {
    fn from(err: LimiterError) -> Self {
        match err {
            LimiterError::InvalidKey => ApiError::BadRequest(err.to_string()),
            LimiterError::InvalidConfig(_) => ApiError::Internal(err.to_string()),
        }
    }
}

// Whole seconds for the `Retry-After` header, never below one.
pub fn retry_after_header_secs(retry_after_secs: f64) -> u64 {
    if retry_after_secs.is_finite() && retry_after_secs > 1.0 {
        retry_after_secs.ceil() as u64
    } else {
        1
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        match self {
            ApiError::RateLimited { retry_after_secs } => {
                let body = json!({
                    "error": self.to_string(),
                    "retryAfterSeconds": retry_after_secs,
                });
                let mut response = (status, Json(body)).into_response();
                let header = HeaderValue::from(retry_after_header_secs(retry_after_secs));
                response.headers_mut().insert(RETRY_AFTER, header);
                response
            }
            _ => (status, Json(json!({ "error": self.to_string() }))).into_response(),
        }
    }
}
