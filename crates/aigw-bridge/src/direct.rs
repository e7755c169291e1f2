//! Direct credentials: the account's OpenAI-compatible Workers AI REST API

use async_trait::async_trait;
use axum::response::Response;
use indexmap::IndexMap;
use secrecy::{ExposeSecret, SecretString};

use crate::error::BridgeError;
use crate::fetch::{Fetch, FetchInit, FetchInput, header_map, http_client, upstream_response};
use crate::gateway::extract_endpoint;

/// Workers AI REST API root
pub const REST_API_BASE: &str = "https://api.cloudflare.com/client/v4/accounts";

/// Outbound caller that sends provider calls straight to Workers AI
pub struct DirectFetch {
    base_url: String,
    api_key: SecretString,
    extra_headers: IndexMap<String, String>,
}

impl DirectFetch {
    pub fn new(account_id: &str, api_key: SecretString, extra_headers: IndexMap<String, String>) -> Self {
        Self {
            base_url: format!("{REST_API_BASE}/{account_id}/ai/v1"),
            api_key,
            extra_headers,
        }
    }

    /// Send calls to another REST host
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    /// OpenAI-compatible base URL calls are rewritten onto
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Rewrite a provider URL onto the REST base, keeping path and query
    pub fn target_url(&self, input: &FetchInput) -> Result<String, BridgeError> {
        let endpoint = extract_endpoint(&input.parse()?);
        Ok(format!("{}/{endpoint}", self.base_url))
    }
}

#[async_trait]
impl Fetch for DirectFetch {
    async fn fetch(&self, input: FetchInput, init: FetchInit) -> Result<Response, BridgeError> {
        let url = self.target_url(&input)?;
        let method = init.method.clone().unwrap_or(http::Method::POST);
        let auth = format!("Bearer {}", self.api_key.expose_secret());

        let headers = header_map(
            init.headers
                .iter()
                .chain(&self.extra_headers)
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .chain([("Content-Type", "application/json"), ("authorization", auth.as_str())]),
        )?;

        tracing::debug!(url = %url, method = %method, "dispatching workers ai rest call");

        let mut request = http_client().request(method, &url).headers(headers);
        if let Some(body) = init.body() {
            request = request.body(body.to_owned());
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(url = %url, error = %e, "workers ai rest call failed");
            BridgeError::Http(e)
        })?;

        Ok(upstream_response(response))
    }
}
