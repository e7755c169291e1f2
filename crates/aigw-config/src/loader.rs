use std::path::Path;

use crate::{Config, ConfigError};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// `{{ env.VAR }}` placeholders are expanded before parsing.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Load` if the file cannot be read, a placeholder
    /// cannot be expanded, the TOML is malformed, or validation fails
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("failed to read {}: {e}", path.display())))?;

        let config = Self::from_toml(&raw)?;
        tracing::debug!(path = %path.display(), "loaded gateway configuration");

        Ok(config)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Load` on expansion, parse or validation failure
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let expanded = crate::env::expand_env(raw)?;

        let config: Self = toml::from_str(&expanded).map_err(|e| ConfigError::Load(e.to_string()))?;
        config.validate()?;

        Ok(config)
    }

    /// Reject settings that could never classify
    ///
    /// A bare `gateway_id` needs an account to address the gateway.
    fn validate(&self) -> Result<(), ConfigError> {
        let gateway = &self.gateway;

        if gateway.gateway_id.is_some() && gateway.account_id.is_none() {
            return Err(ConfigError::Load("gateway.gateway_id requires gateway.account_id".to_owned()));
        }

        for (provider, headers) in &self.provider_headers {
            if let Some(name) = headers.keys().find(|name| name.trim().is_empty()) {
                return Err(ConfigError::Load(format!(
                    "provider_headers.{provider} contains an empty header name `{name}`"
                )));
            }
        }

        Ok(())
    }
}
