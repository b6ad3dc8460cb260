use axum::{
    extract::{rejection::PathRejection, ws::rejection::WebSocketUpgradeRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::error::Error;
use std::fmt;

use crate::auth::AuthError;

/// Message returned for every failure whose details must stay server-side.
const GENERIC_FAILURE: &str = "something went wrong, try again later";

/// The primary error type for the application.
///
/// Every handler and middleware returns this type; its `IntoResponse` impl is the single
/// place where internal failures become HTTP status codes and JSON bodies.
#[derive(Debug)]
pub enum AppError {
    /// Request body was declared as JSON but could not be parsed.
    MalformedBody(String),
    /// Missing, invalid or expired session credential.
    Unauthenticated(String),
    /// Authenticated, but not allowed to touch the resource.
    Forbidden(String),
    /// No matching route or record.
    NotFound(String),
    /// For client errors due to invalid requests.
    BadRequest(String),
    /// A specific field failed validation in a domain collaborator.
    Validation {
        field: String,
        message: String,
    },
    /// Request body exceeded the configured limit.
    PayloadTooLarge {
        limit: usize,
    },
    /// A dependency (usually the database) is not ready yet.
    ServiceUnavailable(String),
    /// Errors reported by the document store.
    Database(String),
    /// For internal server errors that are not expected to be handled by the client.
    Internal(anyhow::Error),
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation { field: field.to_string(), message: message.into() }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedBody(_) | AppError::BadRequest(_) | AppError::Validation { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::MalformedBody(msg) => write!(f, "Malformed body: {}", msg),
            AppError::Unauthenticated(msg) => write!(f, "Unauthenticated: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Validation { field, message } => {
                write!(f, "Validation error on field '{}': {}", field, message)
            }
            AppError::PayloadTooLarge { limit } => {
                write!(f, "Payload too large: limit is {} bytes", limit)
            }
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Internal(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Internal(e) => {
                let error_id = uuid::Uuid::new_v4();
                tracing::error!(%error_id, "Internal error: {:?}", e);
                json!({ "msg": GENERIC_FAILURE, "error_id": error_id.to_string() })
            }
            AppError::Database(msg) => {
                let error_id = uuid::Uuid::new_v4();
                tracing::error!(%error_id, "Database error: {}", msg);
                json!({ "msg": GENERIC_FAILURE, "error_id": error_id.to_string() })
            }
            AppError::Validation { field, message } => json!({ "msg": message, "field": field }),
            AppError::PayloadTooLarge { limit } => {
                json!({ "msg": format!("request body exceeds {} bytes", limit) })
            }
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                json!({ "msg": msg })
            }
            AppError::MalformedBody(msg)
            | AppError::Unauthenticated(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::BadRequest(msg) => json!({ "msg": msg }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<WebSocketUpgradeRejection> for AppError {
    fn from(rejection: WebSocketUpgradeRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        if crate::store::mongo::is_duplicate_key(&err) {
            return AppError::BadRequest("value already in use".to_string());
        }
        AppError::Database(err.to_string())
    }
}

impl From<mongodb::bson::ser::Error> for AppError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        AppError::Database(format!("document encoding failed: {}", err))
    }
}

impl From<mongodb::bson::oid::Error> for AppError {
    fn from(_: mongodb::bson::oid::Error) -> Self {
        AppError::BadRequest("invalid id".to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.into())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(anyhow::anyhow!("{}: {}", err.kind(), err))
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Hashing(reason) => AppError::Internal(anyhow::anyhow!(reason)),
            AuthError::Encoding(reason) => AppError::Internal(anyhow::anyhow!(reason)),
            other => AppError::Unauthenticated(other.to_string()),
        }
    }
}

/// A type alias for `Result<T, AppError>`, used throughout the application.
pub type AppResult<T> = Result<T, AppError>;

/// An extension trait for `Option` that provides a convenient way to convert
/// an `Option` to a `Result` with a `NotFound` error.
pub trait OptionExt<T> {
    fn ok_or_not_found(self, what: &str) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, what: &str) -> AppResult<T> {
        self.ok_or_else(|| AppError::NotFound(format!("no {}", what)))
    }
}
