//! Error types and S3 error codes

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::path::PathBuf;
use tessera_core::CoreError;
use tessera_transport::TransportConfigError;
use thiserror::Error;

/// S3 error codes the gateway emits itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S3ErrorCode {
    AccessDenied,
    EntityTooLarge,
    IncompleteBody,
    InternalError,
    InvalidRequest,
    MethodNotAllowed,
    NoSuchKey,
    NotImplemented,
    OperationAborted,
    PreconditionFailed,
    RequestTimeout,
    ServiceUnavailable,
    SlowDown,
}

impl S3ErrorCode {
    /// Get the error code string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessDenied => "AccessDenied",
            Self::EntityTooLarge => "EntityTooLarge",
            Self::IncompleteBody => "IncompleteBody",
            Self::InternalError => "InternalError",
            Self::InvalidRequest => "InvalidRequest",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::NoSuchKey => "NoSuchKey",
            Self::NotImplemented => "NotImplemented",
            Self::OperationAborted => "OperationAborted",
            Self::PreconditionFailed => "PreconditionFailed",
            Self::RequestTimeout => "RequestTimeout",
            Self::ServiceUnavailable => "ServiceUnavailable",
            Self::SlowDown => "SlowDown",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::EntityTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::IncompleteBody | Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::NoSuchKey => StatusCode::NOT_FOUND,
            Self::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            Self::OperationAborted => StatusCode::CONFLICT,
            Self::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
            Self::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::SlowDown => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Closest code for a status a backend answered with
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::BAD_REQUEST => Self::InvalidRequest,
            StatusCode::FORBIDDEN => Self::AccessDenied,
            StatusCode::NOT_FOUND => Self::NoSuchKey,
            StatusCode::METHOD_NOT_ALLOWED => Self::MethodNotAllowed,
            StatusCode::REQUEST_TIMEOUT => Self::RequestTimeout,
            StatusCode::CONFLICT => Self::OperationAborted,
            StatusCode::PRECONDITION_FAILED => Self::PreconditionFailed,
            StatusCode::PAYLOAD_TOO_LARGE => Self::EntityTooLarge,
            StatusCode::TOO_MANY_REQUESTS => Self::SlowDown,
            StatusCode::NOT_IMPLEMENTED => Self::NotImplemented,
            StatusCode::SERVICE_UNAVAILABLE => Self::ServiceUnavailable,
            _ => Self::InternalError,
        }
    }
}

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    S3Error { code: S3ErrorCode, message: String },

    /// Every backend of the region failed
    #[error("No backend could serve the request")]
    NoSuccessfulResponses { last_status: Option<StatusCode> },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Create a new S3 error
    pub fn s3(code: S3ErrorCode, message: impl Into<String>) -> Self {
        Self::S3Error {
            code,
            message: message.into(),
        }
    }

    /// Get the error code
    pub fn error_code(&self) -> S3ErrorCode {
        match self {
            Self::S3Error { code, .. } => *code,
            Self::NoSuccessfulResponses {
                last_status: Some(status),
            } => S3ErrorCode::from_status(*status),
            Self::NoSuccessfulResponses { last_status: None } => S3ErrorCode::ServiceUnavailable,
            Self::Internal(_) => S3ErrorCode::InternalError,
        }
    }

    /// Status sent to the client; a backend's own failure status is mirrored
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NoSuccessfulResponses {
                last_status: Some(status),
            } => *status,
            _ => self.error_code().status_code(),
        }
    }

    /// Render as an S3 error document
    pub fn into_response_with_id(self, request_id: Option<&str>) -> Response {
        let code = self.error_code();
        let status = self.status_code();
        let message = self.to_string();

        let request_id_element = request_id
            .map(|id| format!("\n    <RequestId>{}</RequestId>", quick_xml::escape::escape(id)))
            .unwrap_or_default();
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Error>
    <Code>{}</Code>
    <Message>{}</Message>{}
</Error>"#,
            code.as_str(),
            quick_xml::escape::escape(message.as_str()),
            request_id_element
        );

        // HEAD responses have no body, the header still carries the code
        (
            status,
            [
                ("Content-Type", "application/xml"),
                ("x-amz-error-code", code.as_str()),
            ],
            xml,
        )
            .into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NoSuccessfulResponses { last_status } => {
                Self::NoSuccessfulResponses { last_status }
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.into_response_with_id(None)
    }
}

/// Configuration and startup errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Backend {0} is defined twice")]
    DuplicateBackend(String),

    #[error("Backend {backend} has an invalid endpoint: {reason}")]
    InvalidEndpoint { backend: String, reason: String },

    #[error("Region {region} has no {missing}")]
    EmptyRegion {
        region: String,
        missing: &'static str,
    },

    #[error("Region {region} references unknown backend {backend}")]
    UnknownBackend { region: String, backend: String },

    #[error("Invalid sync log method: {0}")]
    InvalidMethod(String),

    #[error("Failed to open sync log {path}: {source}")]
    SyncLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Transport(#[from] TransportConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_error_code_strings() {
        assert_eq!(S3ErrorCode::NoSuchKey.as_str(), "NoSuchKey");
        assert_eq!(S3ErrorCode::ServiceUnavailable.as_str(), "ServiceUnavailable");
        assert_eq!(S3ErrorCode::NotImplemented.status_code(), StatusCode::NOT_IMPLEMENTED);
    }

    #[test]
    fn test_backend_status_is_mirrored() {
        let err = ApiError::from(CoreError::NoSuccessfulResponses {
            last_status: Some(StatusCode::NOT_FOUND),
        });
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), S3ErrorCode::NoSuchKey);

        let err = ApiError::from(CoreError::NoSuccessfulResponses {
            last_status: Some(StatusCode::BAD_GATEWAY),
        });
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.error_code(), S3ErrorCode::InternalError);
    }

    #[test]
    fn test_no_response_is_unavailable() {
        let err = ApiError::from(CoreError::NoSuccessfulResponses { last_status: None });
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_other_core_errors_are_internal() {
        let err = ApiError::from(CoreError::Serialization("bad".to_string()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_error_document() {
        let response = ApiError::s3(S3ErrorCode::EntityTooLarge, "body <too> large")
            .into_response_with_id(Some("req-1"));
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(response.headers()["x-amz-error-code"], "EntityTooLarge");

        let body = body_text(response).await;
        assert!(body.contains("<Code>EntityTooLarge</Code>"));
        assert!(body.contains("body &lt;too&gt; large"));
        assert!(body.contains("<RequestId>req-1</RequestId>"));
    }

    #[tokio::test]
    async fn test_error_document_without_request_id() {
        let body = body_text(ApiError::Internal("boom".to_string()).into_response()).await;
        assert!(!body.contains("<RequestId>"));
    }
}
