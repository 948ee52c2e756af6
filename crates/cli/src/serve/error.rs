//! Mapping of store errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use proctrack_core::ValidationError;
use proctrack_storage::StoreError;

use super::json_error;

/// Error returned by the process handlers.
#[derive(Debug)]
pub(crate) enum ApiError {
    Store(StoreError),
    /// The request could not be read at all (malformed JSON, non-UTF-8 body).
    BadRequest(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Store(StoreError::Validation(err))
    }
}

fn validation_response(err: &ValidationError) -> Response {
    let body = serde_json::json!({
        "error": err.to_string(),
        "violations": err.violations,
    });
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                json_error(StatusCode::BAD_REQUEST, &message).into_response()
            }
            ApiError::Store(StoreError::Validation(err)) => validation_response(&err),
            ApiError::Store(err @ StoreError::NotFound(_)) => {
                json_error(StatusCode::NOT_FOUND, &err.to_string()).into_response()
            }
            ApiError::Store(err @ StoreError::Conflict { .. }) => {
                json_error(StatusCode::CONFLICT, &err.to_string()).into_response()
            }
            ApiError::Store(err @ StoreError::Import(_)) => {
                json_error(StatusCode::BAD_REQUEST, &err.to_string()).into_response()
            }
            ApiError::Store(StoreError::Fault(err)) => {
                tracing::error!(error = %err, "storage fault");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal storage error")
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proctrack_storage::StorageError;

    #[test]
    fn status_codes_follow_error_kind() {
        let cases = [
            (
                ApiError::from(ValidationError::single("department", "is required")),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::Store(StoreError::NotFound(4)), StatusCode::NOT_FOUND),
            (
                ApiError::Store(StoreError::Conflict { id: 4, attempts: 16 }),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::Store(StoreError::Fault(StorageError::Closed)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::BadRequest("malformed JSON".to_string()),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
