//! In-process stand-ins for the host's AI bindings

use std::sync::{Arc, Mutex};

use aigw_bridge::{BindingOutput, BridgeError, ByteStream, GatewayBinding, RequestEnvelope, WorkersAiBinding};
use async_trait::async_trait;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::stream;
use serde_json::Value;

/// Gateway binding that records envelopes and answers `{"ok": true}`
#[derive(Default)]
pub struct RecordingGateway {
    envelopes: Mutex<Vec<RequestEnvelope>>,
}

impl RecordingGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn envelopes(&self) -> Vec<RequestEnvelope> {
        self.envelopes.lock().unwrap().clone()
    }
}

#[async_trait]
impl GatewayBinding for RecordingGateway {
    async fn run(&self, request: RequestEnvelope) -> Result<Response, BridgeError> {
        self.envelopes.lock().unwrap().push(request);
        Ok(axum::Json(serde_json::json!({"ok": true})).into_response())
    }
}

/// Workers AI binding answering every run with the same native output
pub struct ScriptedWorkersAi {
    runs: Mutex<Vec<(String, Value)>>,
    reply: Reply,
    gateway: Arc<RecordingGateway>,
}

/// What a scripted run returns
pub enum Reply {
    Json(Value),
    /// Native events, delivered in chunks of the given size
    Events(&'static str, usize),
}

impl ScriptedWorkersAi {
    pub fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            runs: Mutex::new(Vec::new()),
            reply,
            gateway: RecordingGateway::new(),
        })
    }

    pub fn runs(&self) -> Vec<(String, Value)> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkersAiBinding for ScriptedWorkersAi {
    async fn run(&self, model: &str, inputs: Value) -> Result<BindingOutput, BridgeError> {
        self.runs.lock().unwrap().push((model.to_owned(), inputs));

        Ok(match &self.reply {
            Reply::Json(value) => BindingOutput::Json(value.clone()),
            Reply::Events(events, chunk_size) => {
                let chunks: Vec<Result<Bytes, BridgeError>> = events
                    .as_bytes()
                    .chunks(*chunk_size)
                    .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
                    .collect();
                let source: ByteStream = Box::pin(stream::iter(chunks));
                BindingOutput::Stream(source)
            }
        })
    }

    fn gateway(&self, _gateway_id: &str) -> Arc<dyn GatewayBinding> {
        self.gateway.clone()
    }
}
