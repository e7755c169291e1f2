//! OpenAI-style requests run on a Workers AI binding
//!
//! The binding takes `run(model, inputs)` rather than HTTP requests, so the
//! adapter reads the chat completion body, calls the binding, and reshapes
//! its native result (or event stream) into what an `OpenAI` client expects.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axum::Json;
use axum::body::Body;
use axum::response::{IntoResponse, Response};
use futures_util::TryStreamExt;
use http::StatusCode;
use http::header::{CACHE_CONTROL, CONTENT_TYPE};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::binding::{BindingOutput, ByteStream, WorkersAiBinding};
use crate::error::BridgeError;
use crate::fetch::{Fetch, FetchInit, FetchInput};
use crate::id::canonicalize;
use crate::normalize::normalize_messages;
use crate::protocol::openai::{
    AssistantMessage, COMPLETION_OBJECT, ChatCompletion, CompletionChoice, FinishReason, FunctionCall, ToolCall,
};
use crate::protocol::workers_ai::ToolCallFragment;
use crate::transcode::transcode_stream;

/// Outbound caller that runs chat completions on a Workers AI binding
///
/// The call target is ignored; the model comes from the request body.
pub struct WorkersAiBindingFetch {
    binding: Arc<dyn WorkersAiBinding>,
}

impl WorkersAiBindingFetch {
    pub fn new(binding: Arc<dyn WorkersAiBinding>) -> Self {
        Self { binding }
    }

    /// Translate one chat completion request
    ///
    /// A missing or non-JSON body yields a 400 response rather than an error.
    pub async fn translate(&self, init: &FetchInit) -> Result<Response, BridgeError> {
        let Some(raw) = init.body() else {
            return Ok((StatusCode::BAD_REQUEST, "No body").into_response());
        };

        let Ok(Value::Object(body)) = serde_json::from_str::<Value>(raw) else {
            return Ok((StatusCode::BAD_REQUEST, "Invalid JSON body").into_response());
        };

        let model = body.get("model").and_then(Value::as_str).unwrap_or_default().to_owned();
        let stream_requested = body.get("stream").and_then(Value::as_bool).unwrap_or(false);
        let inputs = binding_inputs(&body, stream_requested);

        tracing::debug!(model = %model, stream = stream_requested, "running workers ai binding");

        let output = self
            .binding
            .run(&model, Value::Object(inputs))
            .await
            .inspect_err(|e| tracing::error!(model = %model, error = %e, "workers ai binding run failed"))?;

        let result = match output {
            BindingOutput::Stream(source) if stream_requested => {
                return Ok(event_stream_response(source, model));
            }
            BindingOutput::Stream(source) => Value::String(drain(source).await?),
            BindingOutput::Json(result) => result,
        };

        Ok(Json(completion(&model, &result)).into_response())
    }
}

#[async_trait]
impl Fetch for WorkersAiBindingFetch {
    async fn fetch(&self, _input: FetchInput, init: FetchInit) -> Result<Response, BridgeError> {
        self.translate(&init).await
    }
}

/// Binding inputs from the recognized chat completion fields
fn binding_inputs(body: &Map<String, Value>, stream: bool) -> Map<String, Value> {
    let mut inputs = Map::new();

    if let Some(messages) = body.get("messages").and_then(Value::as_array) {
        inputs.insert("messages".to_owned(), Value::Array(normalize_messages(messages)));
    }
    if let Some(tools) = body.get("tools").filter(|tools| !tools.is_null()) {
        inputs.insert("tools".to_owned(), tools.clone());
    }
    for key in ["temperature", "max_tokens"] {
        if let Some(number) = body.get(key).filter(|value| value.is_number()) {
            inputs.insert(key.to_owned(), number.clone());
        }
    }
    if let Some(format) = body.get("response_format").filter(|format| !format.is_null()) {
        inputs.insert("response_format".to_owned(), format.clone());
    }
    if stream {
        inputs.insert("stream".to_owned(), Value::Bool(true));
    }

    inputs
}

fn event_stream_response(source: ByteStream, model: String) -> Response {
    (
        [(CONTENT_TYPE, "text/event-stream"), (CACHE_CONTROL, "no-cache")],
        Body::from_stream(transcode_stream(source, model)),
    )
        .into_response()
}

/// Collect a stream nobody asked for into text
async fn drain(source: ByteStream) -> Result<String, BridgeError> {
    let bytes: Vec<u8> = source
        .try_fold(Vec::new(), |mut buffer, chunk| async move {
            buffer.extend_from_slice(&chunk);
            Ok(buffer)
        })
        .await?;

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Wrap a native binding result into a single chat completion
fn completion(model: &str, result: &Value) -> ChatCompletion {
    let content = match result {
        Value::Object(fields) => fields.get("response").and_then(Value::as_str).unwrap_or_default().to_owned(),
        Value::Array(_) => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };

    let tool_calls: Vec<ToolCall> = result
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| calls.iter().map(tool_call).collect())
        .unwrap_or_default();

    let finish_reason = FinishReason::from_tool_calls(!tool_calls.is_empty());

    ChatCompletion {
        id: format!("workers-ai-{}", Uuid::new_v4()),
        object: COMPLETION_OBJECT.to_owned(),
        created: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default(),
        model: model.to_owned(),
        choices: vec![CompletionChoice {
            index: 0,
            message: AssistantMessage {
                role: "assistant".to_owned(),
                content,
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            },
            finish_reason,
        }],
    }
}

fn tool_call(value: &Value) -> ToolCall {
    let fragment = ToolCallFragment::from_value(value);
    let id = fragment
        .id
        .map_or_else(|| Uuid::new_v4().to_string(), str::to_owned);

    ToolCall {
        id: canonicalize(&id),
        tool_type: "function".to_owned(),
        function: FunctionCall {
            name: fragment.name.unwrap_or_default().to_owned(),
            arguments: fragment.arguments_text().unwrap_or_else(|| "{}".to_owned()),
        },
    }
}
