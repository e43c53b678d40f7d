//! Endpoint resolver.
//!
//! An [`Endpoint`] owns one immutable [`EndpointConfig`] and decides how to
//! answer each request routed to it: method check, content type, body source
//! and status code.

use crate::config::EndpointConfig;
use crate::error::ResolutionError;
use crate::service::Handler;
use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{error, info, info_span, warn, Instrument, Span};

/// The parts of an inbound request an endpoint looks at.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    pub method: Method,
    pub path: String,
    pub remote_addr: Option<SocketAddr>,
}

impl IncomingRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            remote_addr: None,
        }
    }

    pub fn with_remote_addr(mut self, remote_addr: SocketAddr) -> Self {
        self.remote_addr = Some(remote_addr);
        self
    }
}

/// Where the response body comes from.
#[derive(Debug)]
pub enum ResponseBody {
    /// Inline content from the configuration
    Inline(Bytes),
    /// An opened response file, streamed to the client
    File(File),
}

impl ResponseBody {
    /// Read the whole body into memory.
    pub async fn into_bytes(self) -> std::io::Result<Bytes> {
        match self {
            ResponseBody::Inline(bytes) => Ok(bytes),
            ResponseBody::File(mut file) => {
                use tokio::io::AsyncReadExt;
                let mut content = Vec::new();
                file.read_to_end(&mut content).await?;
                Ok(Bytes::from(content))
            }
        }
    }

    fn into_body(self) -> Body {
        match self {
            ResponseBody::Inline(bytes) => Body::from(bytes),
            ResponseBody::File(file) => Body::from_stream(ReaderStream::new(file)),
        }
    }
}

/// A resolved response: status, content type and body source.
#[derive(Debug)]
pub struct ResponseDescriptor {
    pub status: StatusCode,
    pub content_type: HeaderValue,
    pub body: ResponseBody,
}

impl IntoResponse for ResponseDescriptor {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, self.content_type)],
            self.body.into_body(),
        )
            .into_response()
    }
}

/// A named, statically configured HTTP responder.
pub struct Endpoint {
    config: EndpointConfig,
    status: Option<StatusCode>,
    content_type: HeaderValue,
    span: Span,
}

impl Endpoint {
    /// Create a new endpoint from its configuration.
    ///
    /// Values that fail [`EndpointConfig::validate`] are logged and replaced
    /// by their defaults.
    pub fn new(config: EndpointConfig) -> Self {
        let span = info_span!("endpoint", endpoint = %config.name);

        let status = config.default_response_code.and_then(|code| {
            let status = StatusCode::from_u16(code).ok();
            if status.is_none() {
                span.in_scope(|| warn!(code, "Ignoring invalid response code"));
            }
            status
        });

        let content_type = HeaderValue::from_str(config.content_type()).unwrap_or_else(|_| {
            span.in_scope(|| {
                warn!(
                    content_type = config.content_type(),
                    "Ignoring invalid content type"
                )
            });
            HeaderValue::from_static(crate::config::DEFAULT_CONTENT_TYPE)
        });

        Self {
            config,
            status,
            content_type,
            span,
        }
    }

    /// Name of the endpoint.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    fn allows(&self, method: &Method) -> bool {
        self.config.methods.is_empty()
            || self.config.methods.iter().any(|m| m == method.as_str())
    }

    /// Decide the response for `request`.
    ///
    /// The method check runs first, so a rejected request never touches the
    /// response file. A configured file is opened here and streamed when the
    /// response is written; failing to open it is reported as
    /// [`ResolutionError::BodyUnavailable`].
    pub async fn resolve(
        &self,
        request: &IncomingRequest,
    ) -> Result<ResponseDescriptor, ResolutionError> {
        async {
            let remote = request
                .remote_addr
                .map(|addr| addr.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            info!(method = %request.method, remote_addr = %remote, "Handle request");

            if !self.allows(&request.method) {
                error!(method = %request.method, "Invalid request method");
                return Err(ResolutionError::MethodNotAllowed(request.method.to_string()));
            }

            let body = match &self.config.default_response_file {
                Some(path) => match File::open(path).await {
                    Ok(file) => ResponseBody::File(file),
                    Err(source) => {
                        let err = ResolutionError::BodyUnavailable {
                            path: path.clone(),
                            source,
                        };
                        error!(error = %err, "Response body unavailable");
                        return Err(err);
                    }
                },
                None => ResponseBody::Inline(Bytes::from(
                    self.config.default_response_content.clone(),
                )),
            };

            Ok(ResponseDescriptor {
                status: self.status.unwrap_or(StatusCode::OK),
                content_type: self.content_type.clone(),
                body,
            })
        }
        .instrument(self.span.clone())
        .await
    }
}

#[async_trait]
impl Handler for Endpoint {
    fn name(&self) -> &str {
        Endpoint::name(self)
    }

    async fn handle(&self, request: IncomingRequest) -> Response {
        match self.resolve(&request).await {
            Ok(descriptor) => descriptor.into_response(),
            Err(err) => err.into_response(),
        }
    }
}
