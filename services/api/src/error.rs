//! Custom error types for the API service

use auth::{AccessError, AuthError};
use axum::{
    Json,
    extract::multipart::MultipartRejection,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::{DatabaseError, StorageError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{lifecycle::LifecycleError, payment::PaymentError, repositories::CatalogError};

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed input
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Duplicate login or duplicate item in a request
    #[error("{0}")]
    Conflict(String),

    /// Storage, cache or token failure; the detail is logged, not returned
    #[error("internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match self {
            ApiError::Internal(detail) => {
                error!("Request failed: {}", detail);
                "internal server error".to_string()
            }
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg) => msg,
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Forbidden(reason) => ApiError::Forbidden(reason.to_string()),
            AccessError::Internal(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::DuplicateLogin(_) => ApiError::Conflict(err.to_string()),
            AuthError::InvalidCredentials => ApiError::Unauthorized(err.to_string()),
            AuthError::Validation(msg) => ApiError::BadRequest(msg),
            AuthError::UserNotFound(_) => ApiError::NotFound(err.to_string()),
            AuthError::Token(_) => ApiError::Forbidden("invalid token".to_string()),
            AuthError::Hashing(_) | AuthError::Blacklist(_) | AuthError::Database(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::RequestNotFound
            | LifecycleError::ThreatNotFound(_)
            | LifecycleError::ThreatNotInRequest(_) => ApiError::NotFound(err.to_string()),
            LifecycleError::DuplicateAssociation(_) => ApiError::Conflict(err.to_string()),
            LifecycleError::InvalidStatus(_)
            | LifecycleError::InvalidDateRange
            | LifecycleError::Validation(_) => ApiError::BadRequest(err.to_string()),
            LifecycleError::Database(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(_) => ApiError::NotFound(err.to_string()),
            CatalogError::Cache(_) | CatalogError::Database(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
