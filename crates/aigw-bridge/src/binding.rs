//! Host binding contracts
//!
//! A binding is an in-process stand-in for an HTTP round trip. The
//! Workers AI binding (`env.AI`) runs models directly and can hand out a
//! gateway-scoped binding; the gateway binding (`env.AI.gateway(id)`) only
//! accepts envelopes.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;
use bytes::Bytes;
use futures_util::Stream;
use serde_json::Value;

use crate::error::BridgeError;
use crate::gateway::RequestEnvelope;

/// Byte stream produced by a binding or an HTTP body
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, BridgeError>> + Send>>;

/// Result of a direct Workers AI run
pub enum BindingOutput {
    /// A complete result object (or scalar)
    Json(Value),
    /// A native event stream
    Stream(ByteStream),
}

impl fmt::Debug for BindingOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Self::Stream(_) => f.debug_tuple("Stream").finish_non_exhaustive(),
        }
    }
}

/// Gateway-scoped binding: accepts one envelope per call
#[async_trait]
pub trait GatewayBinding: Send + Sync {
    /// Run an envelope through the gateway
    async fn run(&self, request: RequestEnvelope) -> Result<Response, BridgeError>;
}

/// Full Workers AI binding
#[async_trait]
pub trait WorkersAiBinding: Send + Sync {
    /// Run `model` with binding-native `inputs`
    async fn run(&self, model: &str, inputs: Value) -> Result<BindingOutput, BridgeError>;

    /// Gateway-scoped view of this binding
    fn gateway(&self, gateway_id: &str) -> Arc<dyn GatewayBinding>;
}

/// A binding handed over by the host
///
/// Only the Workers AI variant exposes the gateway selector, which is what
/// tells a direct binding apart from a gateway-scoped one.
#[derive(Clone)]
pub enum BindingHandle {
    /// `env.AI`
    WorkersAi(Arc<dyn WorkersAiBinding>),
    /// `env.AI.gateway(id)`
    Gateway(Arc<dyn GatewayBinding>),
}

impl BindingHandle {
    /// The gateway selector, present only on a full Workers AI binding
    pub fn gateway_selector(&self) -> Option<&Arc<dyn WorkersAiBinding>> {
        match self {
            Self::WorkersAi(binding) => Some(binding),
            Self::Gateway(_) => None,
        }
    }
}

impl fmt::Debug for BindingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkersAi(_) => f.debug_struct("WorkersAi").finish_non_exhaustive(),
            Self::Gateway(_) => f.debug_struct("Gateway").finish_non_exhaustive(),
        }
    }
}

impl From<Arc<dyn WorkersAiBinding>> for BindingHandle {
    fn from(binding: Arc<dyn WorkersAiBinding>) -> Self {
        Self::WorkersAi(binding)
    }
}

impl From<Arc<dyn GatewayBinding>> for BindingHandle {
    fn from(binding: Arc<dyn GatewayBinding>) -> Self {
        Self::Gateway(binding)
    }
}
