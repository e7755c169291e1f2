//! Gateway routing for SDKs that only take a base URL
//!
//! Some provider SDKs cannot be handed a custom outbound caller. For those
//! the gateway is reached by pointing the SDK at the gateway's
//! provider-specific path and adding the gateway headers statically.

use aigw_config::{CacheOptions, ConfigError};
use indexmap::IndexMap;
use secrecy::{ExposeSecret, SecretString};

use crate::gateway::{GATEWAY_AUTH_HEADER, GATEWAY_BASE_URL};
use crate::mode::AdapterConfig;

/// Base URL, key and static headers for an SDK routed through the gateway
pub struct BaseUrlGateway {
    /// `https://gateway.ai.cloudflare.com/v1/{account}/{gateway}/{provider path}`
    pub base_url: String,
    /// Key the SDK should authenticate with
    pub api_key: SecretString,
    /// Headers the SDK should send on every request
    pub headers: IndexMap<String, String>,
}

impl BaseUrlGateway {
    /// Derive SDK settings from a credentials configuration
    ///
    /// `integration` names the SDK in errors. Binding configurations are
    /// rejected since the SDK cannot route calls through a binding.
    pub fn from_config(integration: &str, provider_path: &str, config: &AdapterConfig) -> Result<Self, ConfigError> {
        if config.binding.is_some() {
            return Err(ConfigError::UnsupportedMode {
                integration: integration.to_owned(),
                mode: "binding".to_owned(),
            });
        }

        let settings = &config.settings;
        let (Some(account_id), Some(gateway_id)) = (&settings.account_id, &settings.gateway_id) else {
            return Err(ConfigError::Invalid);
        };

        let api_key = settings
            .api_key
            .as_ref()
            .or(settings.cf_api_key.as_ref())
            .cloned()
            .ok_or(ConfigError::MissingKey)?;

        let mut headers = IndexMap::new();
        if let (Some(_), Some(cf_api_key)) = (&settings.api_key, &settings.cf_api_key) {
            headers.insert(
                GATEWAY_AUTH_HEADER.to_owned(),
                format!("Bearer {}", cf_api_key.expose_secret()),
            );
        }
        headers.extend(cache_headers(&settings.cache));

        Ok(Self {
            base_url: format!("{GATEWAY_BASE_URL}/{account_id}/{gateway_id}/{provider_path}"),
            api_key,
            headers,
        })
    }
}

fn cache_headers(cache: &CacheOptions) -> impl Iterator<Item = (String, String)> {
    cache.headers().into_iter().map(|(name, value)| (name.to_owned(), value))
}

impl std::fmt::Debug for BaseUrlGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseUrlGateway")
            .field("base_url", &self.base_url)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
