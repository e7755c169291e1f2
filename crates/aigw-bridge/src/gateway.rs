//! AI Gateway envelope construction and dispatch
//!
//! Every outgoing provider call is rewritten into the gateway's universal
//! request shape (`{provider, endpoint, headers, query}`) and handed to a
//! gateway binding, or POSTed to the public gateway endpoint.

use async_trait::async_trait;
use axum::response::Response;
use indexmap::IndexMap;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::error::BridgeError;
use crate::fetch::{Fetch, FetchInit, FetchInput, header_map, http_client, upstream_response};
use crate::mode::{GatewayConfig, GatewayTarget};

/// Public AI Gateway endpoint
pub const GATEWAY_BASE_URL: &str = "https://gateway.ai.cloudflare.com/v1";

/// Provider whose calling convention puts the model in the call target
pub const WORKERS_AI_PROVIDER: &str = "workers-ai";

/// Gateway key header, distinct from the provider's `authorization`
pub const GATEWAY_AUTH_HEADER: &str = "cf-aig-authorization";

const CONTENT_TYPE_JSON: (&str, &str) = ("Content-Type", "application/json");

/// Canonical request passed to a gateway binding or sent as the HTTP body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Provider slug, e.g. `openai` or `workers-ai`
    pub provider: String,
    /// Provider path (plus query string) or, for Workers AI, the model
    pub endpoint: String,
    /// Headers forwarded to the provider
    pub headers: IndexMap<String, String>,
    /// Parsed request body
    pub query: Map<String, Value>,
}

/// Outbound caller that routes every call through the AI Gateway
pub struct GatewayFetch {
    provider: String,
    config: GatewayConfig,
    extra_headers: IndexMap<String, String>,
    base_url: String,
}

impl GatewayFetch {
    /// Create a fetcher for `provider`
    ///
    /// `extra_headers` are added to every envelope after the caller's own.
    pub fn new(provider: impl Into<String>, config: GatewayConfig, extra_headers: IndexMap<String, String>) -> Self {
        Self {
            provider: provider.into(),
            config,
            extra_headers,
            base_url: GATEWAY_BASE_URL.to_owned(),
        }
    }

    /// Send credentials-mode calls to another gateway host
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    /// Build the envelope for one outgoing call
    pub fn build_envelope(&self, input: &FetchInput, init: &FetchInit) -> Result<RequestEnvelope, BridgeError> {
        let url = input.parse()?;
        let mut endpoint = extract_endpoint(&url);
        let mut query = parse_query(init.body());

        let cache_headers = self.config.cache.headers();
        let mut headers: IndexMap<String, String> = init.headers.clone();
        headers.extend(self.extra_headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        headers.extend(cache_headers.into_iter().map(|(k, v)| (k.to_owned(), v)));
        headers.insert(CONTENT_TYPE_JSON.0.to_owned(), CONTENT_TYPE_JSON.1.to_owned());

        if self.provider == WORKERS_AI_PROVIDER {
            endpoint = match query.remove("model") {
                Some(Value::String(model)) => model,
                Some(other) => other.to_string(),
                None => String::new(),
            };
            query.remove("instructions");
        }

        if let Some(key) = self.config.target.api_key() {
            headers.insert("authorization".to_owned(), format!("Bearer {}", key.expose_secret()));
        }

        Ok(RequestEnvelope {
            provider: self.provider.clone(),
            endpoint,
            headers,
            query,
        })
    }

    /// POST the envelope to the public gateway endpoint
    async fn send(
        &self,
        envelope: &RequestEnvelope,
        account_id: &str,
        gateway_id: &str,
        cf_api_key: Option<&SecretString>,
    ) -> Result<Response, BridgeError> {
        let url = format!("{}/{account_id}/{gateway_id}", self.base_url);

        let cache_headers = self.config.cache.headers();
        let gateway_auth = cf_api_key.map(|key| format!("Bearer {}", key.expose_secret()));

        let headers = header_map(
            std::iter::once(CONTENT_TYPE_JSON)
                .chain(self.extra_headers.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .chain(cache_headers.iter().map(|(k, v)| (*k, v.as_str())))
                .chain(gateway_auth.as_deref().map(|auth| (GATEWAY_AUTH_HEADER, auth))),
        )?;

        let response = http_client()
            .post(&url)
            .headers(headers)
            .json(envelope)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(provider = %self.provider, error = %e, "gateway request failed");
                BridgeError::Http(e)
            })?;

        Ok(upstream_response(response))
    }
}

#[async_trait]
impl Fetch for GatewayFetch {
    async fn fetch(&self, input: FetchInput, init: FetchInit) -> Result<Response, BridgeError> {
        let envelope = self.build_envelope(&input, &init)?;

        tracing::debug!(
            provider = %envelope.provider,
            endpoint = %envelope.endpoint,
            "dispatching gateway envelope"
        );

        match &self.config.target {
            GatewayTarget::Binding { binding, .. } => binding.run(envelope).await,
            GatewayTarget::Credentials {
                account_id,
                gateway_id,
                cf_api_key,
                ..
            } => self.send(&envelope, account_id, gateway_id, cf_api_key.as_ref()).await,
        }
    }
}

/// Provider path of `url` with one leading `/v1/` (then `/`) removed, plus its query string
pub fn extract_endpoint(url: &Url) -> String {
    let path = url.path();
    let path = path.strip_prefix("/v1/").unwrap_or(path);
    let path = path.strip_prefix('/').unwrap_or(path);

    match url.query().filter(|query| !query.is_empty()) {
        Some(query) => format!("{path}?{query}"),
        None => path.to_owned(),
    }
}

/// Parse a request body into the envelope's `query` object
///
/// Anything that is not a JSON object is kept verbatim under `_raw`.
fn parse_query(body: Option<&str>) -> Map<String, Value> {
    let Some(raw) = body else {
        return Map::new();
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(query)) => query,
        _ => {
            let mut query = Map::new();
            query.insert("_raw".to_owned(), Value::String(raw.to_owned()));
            query
        }
    }
}
