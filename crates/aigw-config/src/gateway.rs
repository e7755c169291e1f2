use secrecy::SecretString;
use serde::Deserialize;

use crate::CacheOptions;

/// Serializable gateway settings
///
/// Which fields are present decides the operating mode once a binding
/// (or its absence) is known. Keys accept both `snake_case` and the
/// `camelCase` spelling used by JavaScript hosts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySettings {
    /// Cloudflare account ID
    #[serde(default, alias = "accountId")]
    pub account_id: Option<String>,
    /// AI Gateway ID
    #[serde(default, alias = "gatewayId")]
    pub gateway_id: Option<String>,
    /// Provider API key, or the Workers AI token in direct credentials mode
    #[serde(default, alias = "apiKey")]
    pub api_key: Option<SecretString>,
    /// AI Gateway key, sent as `cf-aig-authorization`
    #[serde(default, alias = "cfApiKey")]
    pub cf_api_key: Option<SecretString>,
    /// Cache controls
    #[serde(default)]
    pub cache: CacheOptions,
}

impl GatewaySettings {
    /// Settings for the gateway REST endpoint
    pub fn credentials(account_id: impl Into<String>, gateway_id: impl Into<String>) -> Self {
        Self {
            account_id: Some(account_id.into()),
            gateway_id: Some(gateway_id.into()),
            ..Self::default()
        }
    }

    /// Settings for the direct Workers AI REST endpoint
    pub fn direct(account_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            account_id: Some(account_id.into()),
            api_key: Some(SecretString::from(api_key.into())),
            ..Self::default()
        }
    }

    /// Set the provider API key
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(key.into()));
        self
    }

    /// Set the AI Gateway key
    #[must_use]
    pub fn with_cf_api_key(mut self, key: impl Into<String>) -> Self {
        self.cf_api_key = Some(SecretString::from(key.into()));
        self
    }

    /// Set the cache controls
    #[must_use]
    pub fn with_cache(mut self, cache: CacheOptions) -> Self {
        self.cache = cache;
        self
    }
}
