use serde::Deserialize;
use serde_json::{Map, Value};

/// Header asking the gateway to bypass its cache
pub const SKIP_CACHE_HEADER: &str = "cf-aig-skip-cache";
/// Header carrying the cache TTL in seconds
pub const CACHE_TTL_HEADER: &str = "cf-aig-cache-ttl";
/// Header carrying a caller-chosen cache key
pub const CACHE_KEY_HEADER: &str = "cf-aig-cache-key";
/// Header carrying request metadata as JSON text
pub const METADATA_HEADER: &str = "cf-aig-metadata";

/// Gateway cache controls, propagated as request headers
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheOptions {
    /// Bypass the gateway cache for this request
    #[serde(default, alias = "skipCache")]
    pub skip_cache: bool,
    /// Cache TTL in seconds
    #[serde(default, alias = "cacheTtl")]
    pub cache_ttl: Option<u64>,
    /// Custom cache key
    #[serde(default, alias = "customCacheKey")]
    pub custom_cache_key: Option<String>,
    /// Arbitrary metadata attached to the gateway log entry
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

impl CacheOptions {
    /// Header pairs for the configured options, in a fixed order
    ///
    /// Unset options produce no header.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::with_capacity(4);

        if self.skip_cache {
            headers.push((SKIP_CACHE_HEADER, "true".to_owned()));
        }

        if let Some(ttl) = self.cache_ttl {
            headers.push((CACHE_TTL_HEADER, ttl.to_string()));
        }

        if let Some(key) = &self.custom_cache_key {
            headers.push((CACHE_KEY_HEADER, key.clone()));
        }

        if let Some(metadata) = &self.metadata {
            headers.push((METADATA_HEADER, Value::Object(metadata.clone()).to_string()));
        }

        headers
    }
}
