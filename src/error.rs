//! Service error type shared by the HTTP handlers.
//!
//! thiserror for the structured definitions, anyhow for propagation out of
//! the storage layer; the `IntoResponse` impl decides the wire status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// Upstream document store failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Request failed validation
    #[error("invalid request: {0}")]
    Validation(String),

    /// Referenced entity does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Upstream media host failed
    #[error("media upload failed: {0}")]
    Media(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Anything else
    #[error("{0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<sqlx::Error>() {
            Ok(db) => ServiceError::Database(db),
            Err(other) => ServiceError::Internal(other.to_string()),
        }
    }
}

impl ServiceError {
    fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Database(_) | ServiceError::Media(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Serialization(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_reflect_error_class() {
        assert_eq!(
            ServiceError::Validation("days out of range".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::NotFound("patient".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::Media("host unreachable".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ServiceError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn anyhow_conversion_recovers_database_errors() {
        let err: anyhow::Error = sqlx::Error::RowNotFound.into();
        let service: ServiceError = err.into();
        assert!(matches!(service, ServiceError::Database(_)));

        let err = anyhow::anyhow!("plain failure");
        let service: ServiceError = err.into();
        assert!(matches!(service, ServiceError::Internal(_)));
    }
}
