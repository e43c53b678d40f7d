//! Mockice - a configurable HTTP mock server
//!
//! Exposes a set of named endpoints, each answering with a preconfigured
//! static or file-backed response. Useful for stubbing dependent services
//! during development and testing.
//!
//! # Features
//!
//! - **Named Endpoints**: Each endpoint is served at `/<name>`
//! - **Method Filtering**: Restrict an endpoint to a set of HTTP methods
//! - **Static Responses**: Inline text or file content, custom status and content type
//! - **Graceful Shutdown**: First signal drains, second signal exits immediately
//!
//! # Example Configuration
//!
//! ```yaml
//! address: ":8080"
//! endpoints:
//!   - name: hello
//!     methods: [GET]
//!     defaultResponseContent: "Hello World! Mockice here!"
//!   - name: readme
//!     defaultResponseCode: 200
//!     defaultResponseContentType: "text/markdown; charset=utf-8"
//!     defaultResponseFile: ./README.md
//! ```

pub mod config;
pub mod endpoint;
pub mod error;
pub mod logging;
pub mod service;
pub mod signal;

pub use config::{EndpointConfig, MockiceConfig};
pub use endpoint::{Endpoint, IncomingRequest, ResponseBody, ResponseDescriptor};
pub use error::{ConfigError, ResolutionError, ServiceError};
pub use service::{Handler, Service};
pub use signal::ShutdownCoordinator;
