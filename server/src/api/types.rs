//! Shared API types
//!
//! Error responses share one JSON shape: `{"error", "code", "message"}`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::data::DataError;
use crate::domain::IngestError;

/// Standard API error response
#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: String, message: String },
    Internal { message: String },
}

impl ApiError {
    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn from_data(e: DataError) -> Self {
        tracing::error!(error = %e, backend = e.backend(), "Data error");
        Self::internal("Database operation failed")
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::NoEvents => Self::bad_request("NO_EVENTS", e.to_string()),
            IngestError::NoValidEvents => Self::bad_request("NO_VALID_EVENTS", e.to_string()),
            IngestError::Storage(e) => Self::from_data(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, code, message) = match self {
            Self::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, "bad_request", code, message)
            }
            Self::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "INTERNAL".to_string(),
                message,
            ),
        };
        (
            status,
            Json(serde_json::json!({
                "error": error_type,
                "code": code,
                "message": message
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ingest_errors_map_to_bad_request() {
        let resp = ApiError::from(IngestError::NoValidEvents).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "bad_request");
        assert_eq!(body["code"], "NO_VALID_EVENTS");
        assert_eq!(body["message"], "No valid events in batch");
    }

    #[tokio::test]
    async fn test_ingest_storage_failure_is_internal() {
        let err = IngestError::Storage(DataError::Sqlite(sqlx::Error::PoolTimedOut));
        let resp = ApiError::from(err).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "internal_error");
        assert_eq!(body["code"], "INTERNAL");
    }

    #[tokio::test]
    async fn test_internal_hides_details() {
        let resp = ApiError::from_data(DataError::Config("secret detail".to_string())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["code"], "INTERNAL");
        assert_eq!(body["message"], "Database operation failed");
    }
}
