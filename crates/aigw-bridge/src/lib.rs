//! Protocol bridge between OpenAI-style clients and Cloudflare AI backends
//!
//! Outgoing calls are either wrapped into an AI Gateway envelope and sent to
//! a gateway binding or the public gateway endpoint, or translated into a
//! Workers AI binding call whose (possibly streamed) result is reshaped into
//! an OpenAI chat completion.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod adapter;
pub mod base_url;
pub mod binding;
pub mod direct;
pub mod error;
pub mod fetch;
pub mod gateway;
pub mod id;
pub mod mode;
pub mod normalize;
pub mod protocol;
pub mod transcode;

pub use adapter::WorkersAiBindingFetch;
pub use base_url::BaseUrlGateway;
pub use binding::{BindingHandle, BindingOutput, ByteStream, GatewayBinding, WorkersAiBinding};
pub use direct::DirectFetch;
pub use error::BridgeError;
pub use fetch::{Fetch, FetchInit, FetchInput};
pub use gateway::{GatewayFetch, RequestEnvelope};
pub use id::canonicalize;
pub use mode::{AdapterConfig, GatewayConfig, GatewayTarget, OperatingMode, ResolvedConfig};
pub use normalize::normalize_messages;
pub use transcode::{StreamTranscoder, transcode_stream};
