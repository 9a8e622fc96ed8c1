use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;

use crate::services::ServiceError;

#[derive(Debug)]
pub enum ApiError {
    ValidationError(String),

    ExternalApiError { service: String, message: String },

    DatabaseError(String),

    /// Any of the above, with request context echoed back to the caller.
    WithDetails {
        source: Box<ApiError>,
        details: serde_json::Value,
    },
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub timestamp: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            Self::ExternalApiError { service, message } => write!(f, "{service} error: {message}"),
            Self::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            Self::WithDetails { source, .. } => source.fmt(f),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::ExternalApiError { service, message } => {
                tracing::warn!("{} API error: {}", service, message);
                (StatusCode::INTERNAL_SERVER_ERROR, message.clone())
            }
            Self::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            Self::WithDetails { source, .. } => source.status_and_message(),
        }
    }

    #[must_use]
    pub fn with_details(self, details: serde_json::Value) -> Self {
        Self::WithDetails {
            source: Box::new(self),
            details,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn upstream_error(msg: impl Into<String>) -> Self {
        Self::ExternalApiError {
            service: "Ad library".to_string(),
            message: msg.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = self.status_and_message();

        let details = match self {
            Self::WithDetails { details, .. } => Some(details),
            _ => None,
        };

        let body = ErrorBody {
            error,
            details,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => Self::validation(msg),
            ServiceError::Upstream(e) => Self::upstream_error(e.to_string()),
            ServiceError::Storage(msg) => Self::DatabaseError(msg),
        }
    }
}
