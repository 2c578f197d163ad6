use api_shared::ErrorRes;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use hip_core::{AdminError, PipelineError};

/// Error returned by handlers, rendered as `{ "error": ... }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match &e {
            PipelineError::InvalidInput(_)
            | PipelineError::UnknownService(_)
            | PipelineError::DuplicateService(_)
            | PipelineError::InvalidPath { .. }
            | PipelineError::PathNotFound { .. } => Self::bad_request(e.to_string()),
            PipelineError::NoDocumentsFound(_) => Self::not_found(e.to_string()),
            PipelineError::StoreConnection(_) | PipelineError::StoreQuery(_) => {
                tracing::error!("Document store error: {:?}", e);
                Self::new(StatusCode::BAD_GATEWAY, "Document store unavailable")
            }
            _ => {
                tracing::error!("Pipeline error: {:?}", e);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
            }
        }
    }
}

impl From<AdminError> for ApiError {
    fn from(e: AdminError) -> Self {
        Self::not_found(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorRes {
                error: self.message,
            }),
        )
            .into_response()
    }
}
