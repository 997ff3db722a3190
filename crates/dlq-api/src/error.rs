//! Error-to-status mapping for the HTTP surface.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dlq_config::ConfigError;
use dlq_queue::ServiceError;
use serde_json::json;

/// HTTP-facing error with a fixed status mapping.
#[derive(Debug)]
pub enum ApiError {
    /// 400.
    BadRequest(String),
    /// 403.
    Forbidden(String),
    /// 404.
    NotFound(String),
    /// 409: action preconditions (engine refusal, missing GID).
    Conflict(String),
    /// 503: the daemon runs without a configured engine.
    ServiceUnavailable(String),
    /// 500.
    Internal(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &str) {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Forbidden(message) => (StatusCode::FORBIDDEN, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::Conflict(message) => (StatusCode::CONFLICT, message),
            Self::ServiceUnavailable(message) => (StatusCode::SERVICE_UNAVAILABLE, message),
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.parts();
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match &err {
            ServiceError::ActionNotAllowed(_) | ServiceError::MissingEngineGid => {
                Self::Conflict(err.to_string())
            }
            ServiceError::DownloaderNotConfigured => Self::ServiceUnavailable(err.to_string()),
            ServiceError::NotFound => Self::NotFound(err.to_string()),
            ServiceError::Invalid(_) => Self::BadRequest(err.to_string()),
            ServiceError::Store(_) | ServiceError::Engine(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        match &err {
            ConfigError::InvalidSetting { .. } => Self::BadRequest(err.to_string()),
            _ => Self::Internal(err.to_string()),
        }
    }
}
