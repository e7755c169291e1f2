use aigw_config::ConfigError;
use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use thiserror::Error;

/// Errors that can occur while bridging a call
///
/// Backend failures are carried as-is; nothing here retries.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A host binding call failed
    #[error("binding call failed: {0}")]
    Binding(String),

    /// The HTTP call to the gateway failed
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The outgoing call targeted a URL that could not be parsed
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    /// A header name or value cannot be sent over HTTP
    #[error("invalid header `{0}`")]
    InvalidHeader(String),

    /// An upstream byte stream failed
    #[error("streaming error: {0}")]
    Streaming(String),

    /// Configuration could not be classified
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl BridgeError {
    /// HTTP status a host should answer with for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Binding(_) | Self::Http(_) | Self::Streaming(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidUrl(_) | Self::InvalidHeader(_) => StatusCode::BAD_REQUEST,
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error type in `OpenAI` error bodies
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::Binding(_) | Self::Http(_) => "upstream_error",
            Self::Streaming(_) => "streaming_error",
            Self::InvalidUrl(_) | Self::InvalidHeader(_) => "invalid_request_error",
            Self::Config(_) => "configuration_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Message safe to expose to API consumers
    pub fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "an internal error occurred".to_owned(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "message": self.client_message(),
                "type": self.error_type(),
                "code": serde_json::Value::Null,
            }
        });

        (self.status_code(), Json(body)).into_response()
    }
}
