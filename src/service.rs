//! HTTP service: endpoint registry, request dispatch and the listen/drain
//! lifecycle.

use crate::config::normalize_address;
use crate::endpoint::IncomingRequest;
use crate::error::{ServiceError, ERROR_CONTENT_TYPE};
use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default upper bound for draining in-flight requests.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Something that can be registered in the service under a name.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Name of the handler; it is served at `/<name>`.
    fn name(&self) -> &str;

    /// Answer a request routed to this handler.
    async fn handle(&self, request: IncomingRequest) -> Response;
}

type Registry = HashMap<String, Arc<dyn Handler>>;

/// Serves registered handlers over HTTP.
pub struct Service {
    address: String,
    grace_period: Duration,
    handlers: Registry,
}

impl Service {
    /// Create a new service that will listen at `address`.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            grace_period: DEFAULT_GRACE_PERIOD,
            handlers: HashMap::new(),
        }
    }

    /// Set the drain bound used on shutdown.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Register a handler at `/<name>`.
    ///
    /// Names must be non-empty and unique.
    pub fn register<H>(&mut self, handler: H) -> Result<(), ServiceError>
    where
        H: Handler + 'static,
    {
        let name = handler.name();
        if name.is_empty() {
            return Err(ServiceError::InvalidName);
        }

        let path = format!("/{}", name);
        if self.handlers.contains_key(&path) {
            return Err(ServiceError::DuplicateName(name.to_string()));
        }

        debug!(path = %path, "Registered handler");
        self.handlers.insert(path, Arc::new(handler));
        Ok(())
    }

    /// Registered paths, sorted.
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    /// Build the router dispatching to the registered handlers.
    ///
    /// The registry is frozen at this point.
    pub fn router(&self) -> Router {
        let registry = Arc::new(self.handlers.clone());
        Router::new().fallback(dispatch).with_state(registry)
    }

    /// Bind the configured address and serve until `shutdown` is cancelled.
    pub async fn start(self, shutdown: CancellationToken) -> Result<(), ServiceError> {
        let address = normalize_address(&self.address);
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ServiceError::Bind { address, source })?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` is cancelled.
    ///
    /// Returns early with an error if the server stops on its own. After
    /// cancellation new connections are refused and in-flight requests get
    /// up to the grace period to finish.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), ServiceError> {
        let local_addr = listener.local_addr().map_err(ServiceError::Serve)?;
        info!(
            address = %local_addr,
            endpoints = self.handlers.len(),
            "Service listening"
        );

        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();
        let drain = shutdown.clone();
        let mut server: JoinHandle<std::io::Result<()>> = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { drain.cancelled().await })
                .await
        });

        tokio::select! {
            result = &mut server => {
                return flatten(result);
            }
            () = shutdown.cancelled() => {}
        }

        info!(grace_period = ?self.grace_period, "Shutting down service");
        match tokio::time::timeout(self.grace_period, &mut server).await {
            Ok(result) => flatten(result)?,
            Err(_) => {
                warn!(
                    grace_period = ?self.grace_period,
                    "Grace period elapsed, no longer waiting for in-flight requests"
                );
                server.abort();
            }
        }

        info!("Service stopped");
        Ok(())
    }
}

fn flatten(
    result: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), ServiceError> {
    match result {
        Ok(served) => served.map_err(ServiceError::Serve),
        Err(join) => Err(ServiceError::Serve(std::io::Error::other(join))),
    }
}

async fn dispatch(State(registry): State<Arc<Registry>>, request: Request<Body>) -> Response {
    // Names are registered unencoded, so match on the decoded path.
    let Ok(path) = percent_decode_str(request.uri().path()).decode_utf8() else {
        debug!(path = %request.uri().path(), "Path is not valid UTF-8");
        return not_found();
    };
    let path = path.into_owned();
    let Some(handler) = registry.get(&path) else {
        debug!(path = %path, "No endpoint registered");
        return not_found();
    };

    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let mut incoming = IncomingRequest::new(request.method().clone(), path);
    incoming.remote_addr = remote_addr;

    handler.handle(incoming).await
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(ERROR_CONTENT_TYPE)),
            (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
        ],
        "404 page not found\n",
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointConfig;
    use crate::endpoint::Endpoint;
    use axum::http::Method;
    use tower::ServiceExt;

    fn endpoint(name: &str, content: &str) -> Endpoint {
        Endpoint::new(EndpointConfig {
            name: name.to_string(),
            default_response_content: content.to_string(),
            ..EndpointConfig::default()
        })
    }

    async fn call(router: Router, method: Method, uri: &str) -> (StatusCode, String) {
        let request = axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn test_register_default() {
        let mut svc = Service::new("localhost:8080");
        for cfg in EndpointConfig::defaults() {
            svc.register(Endpoint::new(cfg)).unwrap();
        }
        assert_eq!(svc.paths(), vec!["/hello"]);
    }

    #[test]
    fn test_register_multiple() {
        let mut svc = Service::new("localhost:8080");
        for name in ["test1", "test2", "test3"] {
            svc.register(endpoint(name, "")).unwrap();
        }
        assert_eq!(svc.paths(), vec!["/test1", "/test2", "/test3"]);
    }

    #[test]
    fn test_register_noname() {
        let mut svc = Service::new("localhost:8080");
        let err = svc.register(endpoint("", "")).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidName));
        assert!(svc.paths().is_empty());
    }

    #[test]
    fn test_register_duplicate() {
        let mut svc = Service::new("localhost:8080");
        svc.register(endpoint("dup", "first")).unwrap();
        let err = svc.register(endpoint("dup", "second")).unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateName(ref name) if name == "dup"));
    }

    #[tokio::test]
    async fn test_duplicate_keeps_first_registration() {
        let mut svc = Service::new("localhost:8080");
        svc.register(endpoint("dup", "first")).unwrap();
        let _ = svc.register(endpoint("dup", "second"));

        let (status, body) = call(svc.router(), Method::GET, "/dup").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "first");
    }

    #[tokio::test]
    async fn test_dispatch_by_exact_path() {
        let mut svc = Service::new("localhost:8080");
        svc.register(endpoint("one", "1")).unwrap();
        svc.register(endpoint("two", "2")).unwrap();
        let router = svc.router();

        assert_eq!(
            call(router.clone(), Method::GET, "/one").await,
            (StatusCode::OK, "1".to_string())
        );
        assert_eq!(
            call(router.clone(), Method::POST, "/two?ignored=query").await,
            (StatusCode::OK, "2".to_string())
        );

        let (status, body) = call(router.clone(), Method::GET, "/one/extra").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "404 page not found\n");

        let (status, _) = call(router, Method::GET, "/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_dispatch_decodes_path() {
        let mut svc = Service::new("localhost:8080");
        svc.register(endpoint("a b", "spaced")).unwrap();
        svc.register(endpoint("żółć", "unicode")).unwrap();
        let router = svc.router();

        assert_eq!(
            call(router.clone(), Method::GET, "/a%20b").await,
            (StatusCode::OK, "spaced".to_string())
        );
        assert_eq!(
            call(router.clone(), Method::GET, "/%C5%BC%C3%B3%C5%82%C4%87").await,
            (StatusCode::OK, "unicode".to_string())
        );

        let (status, _) = call(router, Method::GET, "/%FF%FE").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_dispatch_method_not_allowed() {
        let mut svc = Service::new("localhost:8080");
        svc.register(Endpoint::new(EndpointConfig {
            name: "x".to_string(),
            methods: vec!["GET".to_string()],
            default_response_content: "ok".to_string(),
            ..EndpointConfig::default()
        }))
        .unwrap();

        let (status, body) = call(svc.router(), Method::DELETE, "/x").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body, "Invalid request method\n");
    }

    #[tokio::test]
    async fn test_start_and_cancel() {
        let svc = Service::new("127.0.0.1:0");
        let token = CancellationToken::new();

        let handle = tokio::spawn(svc.start(token.clone()));
        token.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_start_bind_failure() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = taken.local_addr().unwrap().to_string();

        // Never cancelled: the bind error must come back on its own.
        let token = CancellationToken::new();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            Service::new(address.clone()).start(token),
        )
        .await
        .unwrap();

        match result {
            Err(ServiceError::Bind { address: failed, .. }) => assert_eq!(failed, address),
            other => panic!("expected bind error, got {:?}", other),
        }
    }
}
