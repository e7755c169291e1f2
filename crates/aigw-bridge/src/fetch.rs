//! The outbound caller seam
//!
//! SDK clients accept a `fetch`-shaped function. Here that is the [`Fetch`]
//! trait: given a target and request init, produce an HTTP response.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::response::Response;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use indexmap::IndexMap;
use url::Url;

use crate::error::BridgeError;

/// Outbound caller used in place of a network `fetch`
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Perform one outgoing call
    ///
    /// Backend failures are returned unchanged; implementations never retry.
    async fn fetch(&self, input: FetchInput, init: FetchInit) -> Result<Response, BridgeError>;
}

/// Target of an outgoing call
#[derive(Debug, Clone)]
pub enum FetchInput {
    /// A URL string
    Str(String),
    /// A parsed URL
    Url(Url),
    /// A request whose URI is the target (its body is ignored)
    Request(http::request::Parts),
}

impl FetchInput {
    /// The target as a plain URL string
    pub fn href(&self) -> String {
        match self {
            Self::Str(url) => url.clone(),
            Self::Url(url) => url.as_str().to_owned(),
            Self::Request(parts) => parts.uri.to_string(),
        }
    }

    /// Parse the target into a URL
    pub fn parse(&self) -> Result<Url, BridgeError> {
        let href = self.href();
        Url::parse(&href).map_err(|e| BridgeError::InvalidUrl(format!("{href}: {e}")))
    }
}

impl From<&str> for FetchInput {
    fn from(url: &str) -> Self {
        Self::Str(url.to_owned())
    }
}

impl From<String> for FetchInput {
    fn from(url: String) -> Self {
        Self::Str(url)
    }
}

impl From<Url> for FetchInput {
    fn from(url: Url) -> Self {
        Self::Url(url)
    }
}

impl<B> From<http::Request<B>> for FetchInput {
    fn from(request: http::Request<B>) -> Self {
        Self::Request(request.into_parts().0)
    }
}

/// Request options of an outgoing call
#[derive(Debug, Clone, Default)]
pub struct FetchInit {
    /// HTTP method, `POST` when unset
    pub method: Option<http::Method>,
    /// Caller headers, in insertion order
    pub headers: IndexMap<String, String>,
    /// Raw request body
    pub body: Option<String>,
}

impl FetchInit {
    /// A `POST` with the given raw body
    pub fn post(body: impl Into<String>) -> Self {
        Self {
            method: Some(http::Method::POST),
            headers: IndexMap::new(),
            body: Some(body.into()),
        }
    }

    /// A `POST` with a JSON body
    pub fn json(body: &serde_json::Value) -> Self {
        Self::post(body.to_string())
    }

    /// Add a caller header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// The body, treating an empty string as absent
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref().filter(|body| !body.is_empty())
    }
}

/// Shared HTTP client for gateway calls
///
/// # Panics
///
/// Panics if the TLS backend cannot be initialized on first use
pub fn http_client() -> reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

    CLIENT
        .get_or_init(|| {
            reqwest::Client::builder()
                .pool_idle_timeout(Some(Duration::from_secs(30)))
                .tcp_nodelay(true)
                .tcp_keepalive(Some(Duration::from_secs(60)))
                .build()
                .expect("Failed to build default HTTP client")
        })
        .clone()
}

/// Convert ordered string headers into a `HeaderMap`
///
/// Later entries replace earlier ones with the same (case-insensitive) name.
pub fn header_map<'a>(headers: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<HeaderMap, BridgeError> {
    let mut map = HeaderMap::new();

    for (name, value) in headers {
        let header_name = HeaderName::try_from(name).map_err(|_| BridgeError::InvalidHeader(name.to_owned()))?;
        let header_value = HeaderValue::try_from(value).map_err(|_| BridgeError::InvalidHeader(name.to_owned()))?;
        map.insert(header_name, header_value);
    }

    Ok(map)
}

/// Re-expose an upstream HTTP response, streaming its body through
pub fn upstream_response(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let headers = upstream.headers().clone();

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;

    response
}
