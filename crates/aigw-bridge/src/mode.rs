//! Operating mode classification
//!
//! An adapter configuration is ambiguous until a binding (or its absence)
//! is known. [`AdapterConfig::resolve`] settles that once and moves the
//! fields each mode needs into a [`ResolvedConfig`].

use std::fmt;
use std::sync::Arc;

use aigw_config::{CacheOptions, ConfigError, GatewaySettings};
use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Serialize;
use strum::Display;

use crate::adapter::WorkersAiBindingFetch;
use crate::binding::{BindingHandle, GatewayBinding, WorkersAiBinding};
use crate::direct::DirectFetch;
use crate::fetch::Fetch;
use crate::gateway::GatewayFetch;

/// How outgoing calls reach the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OperatingMode {
    /// Workers AI binding, calls translated in-process
    DirectBinding,
    /// Workers AI REST API with an account token
    DirectCredentials,
    /// Gateway-scoped binding
    GatewayBinding,
    /// AI Gateway REST endpoint
    GatewayCredentials,
}

/// Adapter configuration: serializable settings plus an optional host binding
#[derive(Debug, Clone, Default)]
pub struct AdapterConfig {
    /// Host binding, attached at runtime
    pub binding: Option<BindingHandle>,
    /// Account, gateway, keys and cache options
    pub settings: GatewaySettings,
}

impl AdapterConfig {
    /// A configuration without a binding
    pub fn from_settings(settings: GatewaySettings) -> Self {
        Self { binding: None, settings }
    }

    /// Attach a host binding
    #[must_use]
    pub fn with_binding(mut self, binding: impl Into<BindingHandle>) -> Self {
        self.binding = Some(binding.into());
        self
    }

    /// Decide the operating mode without consuming the configuration
    pub fn classify(&self) -> Result<OperatingMode, ConfigError> {
        let settings = &self.settings;

        if let Some(binding) = &self.binding {
            return Ok(if binding.gateway_selector().is_some() {
                OperatingMode::DirectBinding
            } else {
                OperatingMode::GatewayBinding
            });
        }

        if settings.gateway_id.is_some() {
            let has_key = settings.api_key.is_some() || settings.cf_api_key.is_some();
            return if settings.account_id.is_some() && has_key {
                Ok(OperatingMode::GatewayCredentials)
            } else {
                Err(ConfigError::Invalid)
            };
        }

        if settings.account_id.is_some() && settings.api_key.is_some() {
            return Ok(OperatingMode::DirectCredentials);
        }

        Err(ConfigError::Invalid)
    }

    /// Classify and move each mode's fields into a [`ResolvedConfig`]
    pub fn resolve(self) -> Result<ResolvedConfig, ConfigError> {
        let mode = self.classify()?;
        let GatewaySettings {
            account_id,
            gateway_id,
            api_key,
            cf_api_key,
            cache,
        } = self.settings;

        let resolved = match (mode, self.binding) {
            (OperatingMode::DirectBinding, Some(BindingHandle::WorkersAi(binding))) => {
                ResolvedConfig::DirectBinding(binding)
            }
            (OperatingMode::GatewayBinding, Some(BindingHandle::Gateway(binding))) => {
                ResolvedConfig::Gateway(GatewayConfig {
                    target: GatewayTarget::Binding { binding, api_key },
                    cache,
                })
            }
            (OperatingMode::GatewayCredentials, None) => match (account_id, gateway_id) {
                (Some(account_id), Some(gateway_id)) => ResolvedConfig::Gateway(GatewayConfig {
                    target: GatewayTarget::Credentials {
                        account_id,
                        gateway_id,
                        api_key,
                        cf_api_key,
                    },
                    cache,
                }),
                _ => return Err(ConfigError::Invalid),
            },
            (OperatingMode::DirectCredentials, None) => match (account_id, api_key) {
                (Some(account_id), Some(api_key)) => ResolvedConfig::DirectCredentials { account_id, api_key },
                _ => return Err(ConfigError::Invalid),
            },
            _ => return Err(ConfigError::Invalid),
        };

        tracing::debug!(mode = %mode, "resolved adapter configuration");
        Ok(resolved)
    }

    /// Resolve and build the outbound caller for `provider`
    pub fn into_fetcher(
        self,
        provider: impl Into<String>,
        extra_headers: IndexMap<String, String>,
    ) -> Result<Arc<dyn Fetch>, ConfigError> {
        Ok(self.resolve()?.into_fetcher(provider, extra_headers))
    }
}

impl From<GatewaySettings> for AdapterConfig {
    fn from(settings: GatewaySettings) -> Self {
        Self::from_settings(settings)
    }
}

/// A classified configuration owning exactly the fields its mode uses
#[derive(Clone)]
pub enum ResolvedConfig {
    /// Calls are translated and run on the Workers AI binding
    DirectBinding(Arc<dyn WorkersAiBinding>),
    /// Calls go to the Workers AI REST API
    DirectCredentials {
        /// Cloudflare account ID
        account_id: String,
        /// Workers AI token
        api_key: SecretString,
    },
    /// Calls are wrapped into gateway envelopes
    Gateway(GatewayConfig),
}

impl ResolvedConfig {
    pub const fn mode(&self) -> OperatingMode {
        match self {
            Self::DirectBinding(_) => OperatingMode::DirectBinding,
            Self::DirectCredentials { .. } => OperatingMode::DirectCredentials,
            Self::Gateway(GatewayConfig {
                target: GatewayTarget::Binding { .. },
                ..
            }) => OperatingMode::GatewayBinding,
            Self::Gateway(GatewayConfig {
                target: GatewayTarget::Credentials { .. },
                ..
            }) => OperatingMode::GatewayCredentials,
        }
    }

    /// Build the outbound caller for `provider`
    ///
    /// `extra_headers` only apply to gateway and REST calls; binding calls
    /// carry no headers.
    pub fn into_fetcher(self, provider: impl Into<String>, extra_headers: IndexMap<String, String>) -> Arc<dyn Fetch> {
        match self {
            Self::DirectBinding(binding) => Arc::new(WorkersAiBindingFetch::new(binding)),
            Self::DirectCredentials { account_id, api_key } => {
                Arc::new(DirectFetch::new(&account_id, api_key, extra_headers))
            }
            Self::Gateway(config) => Arc::new(GatewayFetch::new(provider, config, extra_headers)),
        }
    }
}

impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectBinding(_) => f.debug_tuple("DirectBinding").finish_non_exhaustive(),
            Self::DirectCredentials { account_id, .. } => f
                .debug_struct("DirectCredentials")
                .field("account_id", account_id)
                .finish_non_exhaustive(),
            Self::Gateway(config) => f.debug_tuple("Gateway").field(config).finish(),
        }
    }
}

/// Settings for the gateway modes
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Where envelopes are sent
    pub target: GatewayTarget,
    /// Cache controls, sent as `cf-aig-*` headers
    pub cache: CacheOptions,
}

/// Where gateway envelopes are sent
#[derive(Clone)]
pub enum GatewayTarget {
    /// A gateway-scoped binding
    Binding {
        binding: Arc<dyn GatewayBinding>,
        api_key: Option<SecretString>,
    },
    /// The public gateway endpoint
    Credentials {
        account_id: String,
        gateway_id: String,
        api_key: Option<SecretString>,
        cf_api_key: Option<SecretString>,
    },
}

impl GatewayTarget {
    /// Provider API key, sent as `authorization` inside the envelope
    pub const fn api_key(&self) -> Option<&SecretString> {
        match self {
            Self::Binding { api_key, .. } | Self::Credentials { api_key, .. } => api_key.as_ref(),
        }
    }
}

impl fmt::Debug for GatewayTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binding { api_key, .. } => f
                .debug_struct("Binding")
                .field("api_key", api_key)
                .finish_non_exhaustive(),
            Self::Credentials {
                account_id,
                gateway_id,
                api_key,
                cf_api_key,
            } => f
                .debug_struct("Credentials")
                .field("account_id", account_id)
                .field("gateway_id", gateway_id)
                .field("api_key", api_key)
                .field("cf_api_key", cf_api_key)
                .finish(),
        }
    }
}
