use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::database::VectorDBError;

/// Error taxonomy for the ingestion and retrieval pipeline.
///
/// Every variant maps onto one HTTP status; handlers never let an error
/// escape without turning it into the `{error, success: false}` envelope.
#[derive(Error, Debug)]
pub enum RfpError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0} environment variable is not set.")]
    CredentialMissing(&'static str),
    #[error("Failed to read PDF: {0}")]
    ExtractionFailed(String),
    #[error("Embedding service error: {0}")]
    EmbeddingServiceError(String),
    #[error("Retrieval service error: {0}")]
    RetrievalServiceError(String),
    #[error("Completion service error: {0}")]
    CompletionServiceError(String),
    #[error("Model output is not a valid extraction result: {0}")]
    MalformedModelOutput(String),
    #[error("Index '{0}' did not become available in time")]
    IndexUnavailable(String),
    #[error("Index '{0}' is protected and cannot be deleted")]
    ProtectedResource(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, RfpError>;

impl RfpError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RfpError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RfpError::ProtectedResource(_) => StatusCode::FORBIDDEN,
            RfpError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<VectorDBError> for RfpError {
    fn from(err: VectorDBError) -> Self {
        RfpError::RetrievalServiceError(err.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for RfpError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        RfpError::Internal(format!("Failed to render spreadsheet: {}", err))
    }
}

impl IntoResponse for RfpError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        } else {
            log::warn!("Request rejected: {}", self);
        }

        (
            status,
            Json(json!({
                "error": self.to_string(),
                "success": false,
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_taxonomy() {
        assert_eq!(RfpError::InvalidInput("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(RfpError::ProtectedResource("rfpuploads".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(RfpError::NotFound("doc".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            RfpError::CredentialMissing("OPENAI_API_KEY").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            RfpError::IndexUnavailable("rfpuploads".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_credential_message_names_variable() {
        let err = RfpError::CredentialMissing("OPENAI_API_KEY");
        assert_eq!(err.to_string(), "OPENAI_API_KEY environment variable is not set.");
    }

    #[test]
    fn test_index_errors_map_to_retrieval_failure() {
        let err: RfpError = VectorDBError::Operation("boom".into()).into();
        assert!(matches!(err, RfpError::RetrievalServiceError(message) if message.contains("boom")));

        let err: RfpError = VectorDBError::NotFound("rfp-session-a".into()).into();
        assert!(matches!(err, RfpError::RetrievalServiceError(_)));
    }

    #[tokio::test]
    async fn test_error_envelope_shape() {
        let response = RfpError::ProtectedResource("rfpuploads".into()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["success"], false);
        assert!(value["error"].as_str().unwrap().contains("rfpuploads"));
    }
}
