//! Transport Layer for the Cloud Build API
//!
//! Abstracts HTTP for testability. Provides:
//! - Transport trait: authenticated request/response exchange with the API
//! - ArtifactSource trait: bare GET on pre-signed artifact URLs
//! - HttpTransport / HttpArtifactSource: reqwest-backed production impls
//!
//! Scripted doubles live in [`crate::mock`].

use std::fmt;
use std::io::Read;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

/// HTTP method used by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request against a project-scoped API resource
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to `orgs/{org}/projects/{project}/`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_query(mut self, name: &str, value: impl Into<String>) -> Self {
        self.query.push((name.to_string(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Value of a query parameter, if set
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Raw response: status, headers, body
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Response of an artifact fetch; the body is streamed
pub struct ArtifactResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Box<dyn Read + Send>,
}

impl fmt::Debug for ArtifactResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Transport trait for API communication
pub trait Transport: Send + Sync {
    /// Execute an authenticated request and return the raw response
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// Source of artifact bytes behind pre-signed URLs
pub trait ArtifactSource: Send + Sync {
    fn fetch(&self, url: &str) -> Result<ArtifactResponse, TransportError>;
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::ConnectionFailed(err.to_string())
        } else if err.is_builder() {
            TransportError::InvalidUrl(err.to_string())
        } else {
            TransportError::Http(err.to_string())
        }
    }
}

/// HTTP transport configuration
#[derive(Clone)]
pub struct HttpTransportConfig {
    /// API root, e.g. `https://build-api.cloud.unity3d.com/api/v1`
    pub base_url: String,
    pub org_id: String,
    pub project_id: String,
    /// Sent as the basic-auth password with an empty user name
    pub api_key: String,
    pub timeout: Duration,
}

impl fmt::Debug for HttpTransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransportConfig")
            .field("base_url", &self.base_url)
            .field("org_id", &self.org_id)
            .field("project_id", &self.project_id)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpTransportConfig {
    /// Absolute URL of a project-scoped resource
    pub fn resource_url(&self, path: &str) -> String {
        format!(
            "{}/orgs/{}/projects/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.org_id,
            self.project_id,
            path.trim_start_matches('/')
        )
    }
}

/// Production transport backed by a blocking reqwest client
pub struct HttpTransport {
    config: HttpTransportConfig,
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("ucb-tool/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.config.resource_url(&request.path);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };

        debug!(method = %request.method, url = %url, "api request");

        let mut builder = self
            .client
            .request(method, &url)
            .basic_auth("", Some(&self.config.api_key));
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response.bytes()?.to_vec();

        debug!(status, bytes = body.len(), "api response");

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

/// Artifact downloader; pre-signed URLs carry their own authorization
pub struct HttpArtifactSource {
    client: reqwest::blocking::Client,
}

impl HttpArtifactSource {
    /// `connect_timeout` bounds connection setup only; transfers may run long
    pub fn new(connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("ucb-tool/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(connect_timeout)
            .timeout(None::<Duration>)
            .build()?;
        Ok(Self { client })
    }
}

impl ArtifactSource for HttpArtifactSource {
    fn fetch(&self, url: &str) -> Result<ArtifactResponse, TransportError> {
        let response = self.client.get(url).send()?;
        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        Ok(ArtifactResponse {
            status,
            headers,
            body: Box::new(response),
        })
    }
}

fn collect_headers(headers: &reqwest::header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}
