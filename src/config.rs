//! Configuration for the mock server.
//!
//! Defines the listen address and the set of endpoints, each with its
//! allowed methods and the static response it returns.

use crate::error::ConfigError;
use axum::http::{HeaderValue, Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Listen address used when none is configured.
pub const DEFAULT_ADDRESS: &str = ":8080";

/// Content type returned when an endpoint does not configure one.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Main configuration for the mock server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MockiceConfig {
    /// Listen address, e.g. `:8080` or `127.0.0.1:9000`
    #[serde(default = "default_address")]
    pub address: String,

    /// Upper bound for draining in-flight requests on shutdown
    #[serde(default = "default_grace_period", rename = "shutdownGracePeriodSeconds")]
    pub shutdown_grace_period_secs: u64,

    /// Endpoint definitions
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

fn default_grace_period() -> u64 {
    30
}

impl Default for MockiceConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            shutdown_grace_period_secs: default_grace_period(),
            endpoints: EndpointConfig::defaults(),
        }
    }
}

impl MockiceConfig {
    /// Load configuration from a YAML or JSON file.
    ///
    /// Files ending in `.json` are parsed as JSON, anything else as YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(&content).map_err(|e| e.to_string())
        };

        let config: Self = parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or fall back to the built-in defaults when no path
    /// (or an empty one) is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) if !path.as_os_str().is_empty() => Self::from_file(path),
            _ => Ok(Self::default()),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for (index, endpoint) in self.endpoints.iter().enumerate() {
            endpoint
                .validate()
                .map_err(|message| ConfigError::InvalidEndpoint { index, message })?;
            if !seen.insert(endpoint.name.as_str()) {
                return Err(ConfigError::DuplicateEndpoint(endpoint.name.clone()));
            }
        }
        Ok(())
    }

    /// Drain bound for graceful shutdown.
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_period_secs)
    }
}

/// Turn `:8080` into `0.0.0.0:8080`; an empty address becomes the default.
pub fn normalize_address(address: &str) -> String {
    let address = address.trim();
    let address = if address.is_empty() {
        DEFAULT_ADDRESS
    } else {
        address
    };
    match address.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{}", port),
        None => address.to_string(),
    }
}

/// A single endpoint definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EndpointConfig {
    /// Endpoint name, served at `/<name>`
    #[serde(default)]
    pub name: String,

    /// Allowed HTTP methods (empty = any)
    #[serde(default)]
    pub methods: Vec<String>,

    /// Status code to answer with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_response_code: Option<u16>,

    /// Inline response body
    #[serde(default)]
    pub default_response_content: String,

    /// Response content type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_response_content_type: Option<String>,

    /// File whose content is the response body; wins over inline content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_response_file: Option<PathBuf>,
}

impl EndpointConfig {
    /// The endpoint set used when no configuration file is given.
    pub fn defaults() -> Vec<Self> {
        vec![Self {
            name: "hello".to_string(),
            default_response_content: "Hello World! Mockice here!".to_string(),
            ..Self::default()
        }]
    }

    /// Content type the endpoint responds with.
    pub fn content_type(&self) -> &str {
        self.default_response_content_type
            .as_deref()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
    }

    /// Validate the endpoint definition.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("Endpoint name cannot be empty".to_string());
        }
        if let Some(code) = self.default_response_code {
            StatusCode::from_u16(code).map_err(|_| format!("Invalid status code: {}", code))?;
        }
        if let Some(content_type) = &self.default_response_content_type {
            HeaderValue::from_str(content_type)
                .map_err(|_| format!("Invalid content type: {:?}", content_type))?;
        }
        for method in &self.methods {
            Method::from_bytes(method.as_bytes())
                .map_err(|_| format!("Invalid method: {:?}", method))?;
        }
        Ok(())
    }
}
