//! Domain error to HTTP response mapping.
//!
//! Every failure renders as `{"error": CODE, "message": ..., "details": ...}`
//! with the status taken from the shared [`AppError`] envelope.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tracing::error;

use docgate_core::redaction::RedactionError;
use docgate_core::storage::StorageError;
use docgate_shared::AppError;

/// An error returned by a handler.
#[derive(Debug)]
pub struct ApiError {
    error: AppError,
    details: Option<Value>,
}

impl ApiError {
    /// Attach structured details.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// A 400 with the given message.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into()).into()
    }

    /// The envelope error.
    #[must_use]
    pub const fn error(&self) -> &AppError {
        &self.error
    }
}

impl From<AppError> for ApiError {
    fn from(error: AppError) -> Self {
        Self {
            error,
            details: None,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        let message = err.to_string();
        let error = match &err {
            StorageError::UnsupportedProvider { .. } | StorageError::InvalidPartList { .. } => {
                AppError::BadRequest(message)
            }
            StorageError::ObjectNotFound { .. } | StorageError::UploadNotFound { .. } => {
                AppError::NotFound(message)
            }
            StorageError::UploadSessionBusy { .. } => AppError::Conflict(message),
            StorageError::ProviderNotConfigured { .. } => AppError::ServiceUnavailable(message),
            StorageError::Upstream { .. } => AppError::ExternalService(message),
            StorageError::Configuration(_) => AppError::Internal(message),
        };
        error.into()
    }
}

impl From<RedactionError> for ApiError {
    fn from(err: RedactionError) -> Self {
        let message = err.to_string();
        match err {
            RedactionError::Storage(inner) => inner.into(),
            RedactionError::Validation { violations } => {
                let details = json!({ "violations": violations });
                Self::from(AppError::Validation(message)).with_details(details)
            }
            RedactionError::DocumentDecode(_) => AppError::Validation(message).into(),
            RedactionError::SessionNotFoundOrExpired { .. } => AppError::NotFound(message).into(),
            RedactionError::NothingToSave { .. } => AppError::Conflict(message).into(),
            RedactionError::DocumentEncode(_)
            | RedactionError::Configuration(_)
            | RedactionError::Worker(_) => AppError::Internal(message).into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self.error, "Request failed");
        }
        let body = json!({
            "error": self.error.error_code(),
            "message": self.error.to_string(),
            "details": self.details,
        });
        (status, Json(body)).into_response()
    }
}

/// Handler result.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use docgate_core::redaction::RedactionViolation;
    use docgate_core::storage::{Operation, Provider};
    use rstest::rstest;

    #[rstest]
    #[case(StorageError::unsupported_provider("dropbox"), 400)]
    #[case(StorageError::invalid_part_list("part 2 was never uploaded"), 400)]
    #[case(StorageError::object_not_found(Provider::Gcp, "b", "k"), 404)]
    #[case(StorageError::upload_not_found("u1"), 404)]
    #[case(StorageError::busy("u1", "completion in progress"), 409)]
    #[case(StorageError::ProviderNotConfigured { provider: Provider::Azure }, 503)]
    #[case(StorageError::configuration("bad endpoint"), 500)]
    fn test_storage_status(#[case] err: StorageError, #[case] status: u16) {
        assert_eq!(ApiError::from(err).error().status_code(), status);
    }

    #[test]
    fn test_upstream_is_bad_gateway() {
        let err = StorageError::Upstream {
            provider: Provider::Aws,
            operation: Operation::Download,
            bucket: "b".into(),
            key: "k".into(),
            cause: "connection reset".into(),
        };
        assert_eq!(ApiError::from(err).error().status_code(), 502);
    }

    #[rstest]
    #[case(RedactionError::session_not_found("s1"), 404)]
    #[case(RedactionError::decode("no header"), 422)]
    #[case(RedactionError::NothingToSave { session_id: "s1".into() }, 409)]
    #[case(RedactionError::Worker("panicked".into()), 500)]
    #[case(RedactionError::Storage(StorageError::upload_not_found("u")), 404)]
    fn test_redaction_status(#[case] err: RedactionError, #[case] status: u16) {
        assert_eq!(ApiError::from(err).error().status_code(), status);
    }

    #[test]
    fn test_validation_carries_violations() {
        let err = ApiError::from(RedactionError::validation(vec![RedactionViolation {
            index: Some(0),
            page_number: Some(3),
            message: "page 3 does not exist".into(),
        }]));
        assert_eq!(err.error().status_code(), 422);
        let details = err.details.unwrap();
        assert_eq!(details["violations"][0]["page_number"], 3);
    }
}
