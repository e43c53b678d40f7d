//! Error types for configuration, registration, serving and request resolution.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::path::PathBuf;

/// Content type used for every error body, independent of endpoint settings.
pub const ERROR_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("while reading configuration from {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("while loading configuration from {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("endpoint {index}: {message}")]
    InvalidEndpoint { index: usize, message: String },

    #[error("duplicate endpoint name: {0}")]
    DuplicateEndpoint(String),
}

/// Errors raised by the service while registering endpoints or serving.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Endpoint name cannot be empty")]
    InvalidName,

    #[error("endpoint /{0} is already registered")]
    DuplicateName(String),

    #[error("while binding HTTP service to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("while serving HTTP service: {0}")]
    Serve(#[source] std::io::Error),
}

/// Per-request failures produced by an endpoint resolver.
///
/// Both variants are contained in the response for the request that caused
/// them and never touch service-wide state.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("Invalid request method {0}")]
    MethodNotAllowed(String),

    #[error("while opening file {}: {source}", path.display())]
    BodyUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ResolutionError {
    /// HTTP status this failure maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            ResolutionError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ResolutionError::BodyUnavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Plaintext body written to the client.
    pub fn body(&self) -> String {
        match self {
            ResolutionError::MethodNotAllowed(_) => "Invalid request method\n".to_string(),
            ResolutionError::BodyUnavailable { .. } => format!("{}\n", self),
        }
    }
}

impl IntoResponse for ResolutionError {
    fn into_response(self) -> Response {
        (
            self.status(),
            [
                (header::CONTENT_TYPE, HeaderValue::from_static(ERROR_CONTENT_TYPE)),
                (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
            ],
            self.body(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_not_allowed_response() {
        let err = ResolutionError::MethodNotAllowed("DELETE".to_string());
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err.body(), "Invalid request method\n");

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            ERROR_CONTENT_TYPE
        );
        assert_eq!(
            response.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
            "nosniff"
        );
    }

    #[test]
    fn test_body_unavailable_mentions_path() {
        let err = ResolutionError::BodyUnavailable {
            path: PathBuf::from("testdata/missing.md"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.body().contains("testdata/missing.md"));
        assert!(err.body().ends_with('\n'));
    }

    #[test]
    fn test_invalid_name_message() {
        assert_eq!(
            ServiceError::InvalidName.to_string(),
            "Endpoint name cannot be empty"
        );
    }
}
