#![allow(clippy::must_use_candidate)]

//! Configuration for the AI Gateway bridge
//!
//! Holds the serializable half of an adapter configuration (account and
//! gateway identifiers, keys, cache options). Host bindings are runtime
//! objects and are attached by `aigw-bridge`.

pub mod cache;
mod env;
pub mod error;
pub mod gateway;
mod loader;

use indexmap::IndexMap;
use serde::Deserialize;

pub use cache::*;
pub use error::ConfigError;
pub use gateway::*;

/// Top-level bridge configuration file
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Gateway account, credentials and cache options
    #[serde(default)]
    pub gateway: GatewaySettings,
    /// Extra headers added to every envelope, keyed by provider name
    #[serde(default)]
    pub provider_headers: IndexMap<String, IndexMap<String, String>>,
}

impl Config {
    /// Extra headers configured for a provider, empty when none are set
    pub fn headers_for(&self, provider: &str) -> IndexMap<String, String> {
        self.provider_headers.get(provider).cloned().unwrap_or_default()
    }
}
