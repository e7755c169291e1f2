use thiserror::Error;

/// Errors raised while loading or classifying a configuration
///
/// All of these are raised before any network activity.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration matches none of the accepted shapes
    #[error(
        "invalid Workers AI / AI Gateway configuration: provide one of \
         {{ binding: <Workers AI binding> }} (direct binding), \
         {{ account_id, api_key }} (direct credentials), \
         {{ binding: <AI Gateway binding> }} (gateway binding), or \
         {{ account_id, gateway_id, api_key | cf_api_key }} (gateway credentials)"
    )]
    Invalid,

    /// An integration that cannot intercept outbound calls was given a mode it cannot serve
    #[error(
        "{integration} does not support {mode} configuration: it cannot route requests \
         through a custom fetcher, only gateway credentials ({{ account_id, gateway_id }}) are supported"
    )]
    UnsupportedMode {
        /// Integration that rejected the configuration
        integration: String,
        /// Operating mode that was requested
        mode: String,
    },

    /// Neither a provider key nor a gateway key was configured
    #[error("no API key configured: pass the provider api_key, or the AI Gateway cf_api_key for BYOK and unified billing")]
    MissingKey,

    /// Reading, expanding or parsing a configuration file failed
    #[error("failed to load configuration: {0}")]
    Load(String),
}
