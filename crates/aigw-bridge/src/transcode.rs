//! Workers AI event stream to `OpenAI` chunk stream
//!
//! The binding streams `data: {"response": "..."}` events, with tool calls
//! arriving as a start fragment followed by argument slices. Some models
//! already stream `OpenAI` chunks through the binding; those are passed
//! through with only tool call ids rewritten.

use std::collections::HashSet;
use std::convert::Infallible;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use futures_util::{Stream, StreamExt, stream};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::binding::ByteStream;
use crate::id::{canonicalize, synthesize};
use crate::protocol::openai::{ChatCompletionChunk, ChunkDelta, FinishReason, FunctionDelta, ToolCallDelta};
use crate::protocol::workers_ai::ToolCallFragment;

const DATA_PREFIX: &str = "data: ";
const DONE_MARKER: &str = "[DONE]";
const DONE_EVENT: &[u8] = b"data: [DONE]\n\n";

/// Which dialect the upstream stream speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
    /// No event seen yet
    Undetermined,
    /// Workers AI native events
    Native,
    /// Already `OpenAI` chunks; pinned once seen
    OpenAiPassthrough,
}

/// Per-stream transcoding state
///
/// Owned by exactly one stream. Feed raw upstream bytes with
/// [`push`](Self::push) and call [`finish`](Self::finish) once the input ends.
#[derive(Debug)]
pub struct StreamTranscoder {
    model: String,
    stream_id: String,
    id_seed: u64,
    created_at: u64,
    pending_line: Vec<u8>,
    has_tool_calls: bool,
    format: StreamFormat,
    started_tool_calls: HashSet<u32>,
}

impl StreamTranscoder {
    pub fn new(model: impl Into<String>) -> Self {
        let uuid = Uuid::new_v4();
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();

        Self {
            model: model.into(),
            stream_id: format!("workers-ai-{uuid}"),
            id_seed: uuid.as_u64_pair().0,
            created_at,
            pending_line: Vec::new(),
            has_tool_calls: false,
            format: StreamFormat::Undetermined,
            started_tool_calls: HashSet::new(),
        }
    }

    /// Identifier shared by every chunk of this stream
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub const fn format(&self) -> StreamFormat {
        self.format
    }

    /// Whether any tool call has been seen so far
    pub const fn has_tool_calls(&self) -> bool {
        self.has_tool_calls
    }

    /// Consume one upstream chunk, returning the framed events it completes
    ///
    /// Only complete lines are processed; the remainder waits for the next
    /// chunk. Lines are decoded after splitting, so multi-byte characters may
    /// straddle chunk boundaries.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        // The buffered tail never holds a newline, so only the new chunk is scanned
        let Some(last_newline) = chunk.iter().rposition(|&b| b == b'\n') else {
            self.pending_line.extend_from_slice(chunk);
            return Vec::new();
        };

        let (complete, rest) = chunk.split_at(last_newline + 1);
        let mut lines = std::mem::replace(&mut self.pending_line, rest.to_vec());
        lines.extend_from_slice(complete);

        let mut events = Vec::new();
        for line in lines.split_inclusive(|&b| b == b'\n') {
            let line = String::from_utf8_lossy(line);
            self.process_line(&line, &mut events);
        }
        events
    }

    /// Close the stream: finish chunk for native streams, then the terminator
    ///
    /// A trailing line without a newline is dropped.
    pub fn finish(self) -> Vec<Bytes> {
        if !self.pending_line.is_empty() {
            tracing::debug!(
                stream_id = %self.stream_id,
                bytes = self.pending_line.len(),
                "discarding unterminated trailing line"
            );
        }

        let mut events = Vec::with_capacity(2);
        if self.format != StreamFormat::OpenAiPassthrough {
            let finish = self.chunk(ChunkDelta::default(), Some(FinishReason::from_tool_calls(self.has_tool_calls)));
            events.extend(frame(&finish));
        }
        events.push(Bytes::from_static(DONE_EVENT));
        events
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<Bytes>) {
        let Some(data) = line.trim().strip_prefix(DATA_PREFIX) else {
            return;
        };
        if data == DONE_MARKER {
            return;
        }

        let mut event: Value = match serde_json::from_str(data) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, data = %data, "skipping malformed stream event");
                return;
            }
        };

        if event.get("choices").is_some() {
            self.format = StreamFormat::OpenAiPassthrough;
            self.passthrough(&mut event);
            events.extend(frame(&event));
            return;
        }

        if self.format == StreamFormat::Undetermined {
            self.format = StreamFormat::Native;
        }
        self.native(&event, events);
    }

    fn passthrough(&mut self, event: &mut Value) {
        if let Some(calls) = event
            .pointer_mut("/choices/0/delta/tool_calls")
            .and_then(Value::as_array_mut)
        {
            self.has_tool_calls = true;
            for call in calls {
                if let Some(Value::String(id)) = call.get_mut("id") {
                    if !id.is_empty() {
                        *id = canonicalize(id);
                    }
                }
            }
        }

        if event.pointer("/choices/0/finish_reason").and_then(Value::as_str) == Some("tool_calls") {
            self.has_tool_calls = true;
        }
    }

    fn native(&mut self, event: &Value, events: &mut Vec<Bytes>) {
        if let Some(text) = event.get("response").and_then(Value::as_str).filter(|text| !text.is_empty()) {
            let delta = ChunkDelta {
                content: Some(text.to_owned()),
                tool_calls: None,
            };
            events.extend(frame(&self.chunk(delta, None)));
        }

        let Some(calls) = event.get("tool_calls").and_then(Value::as_array) else {
            return;
        };

        for call in calls {
            let fragment = ToolCallFragment::from_value(call);
            if fragment.is_finalize_marker() {
                continue;
            }
            self.has_tool_calls = true;

            let delta = if self.started_tool_calls.insert(fragment.index) {
                let id = fragment
                    .id
                    .map_or_else(|| synthesize(self.id_seed, fragment.index), canonicalize);

                ToolCallDelta {
                    index: fragment.index,
                    id: Some(id),
                    tool_type: Some("function".to_owned()),
                    function: Some(FunctionDelta {
                        name: Some(fragment.name.unwrap_or_default().to_owned()),
                        arguments: Some(fragment.arguments_text().unwrap_or_default()),
                    }),
                }
            } else {
                let Some(arguments) = fragment.arguments_text().filter(|text| !text.is_empty()) else {
                    continue;
                };

                ToolCallDelta {
                    index: fragment.index,
                    id: None,
                    tool_type: None,
                    function: Some(FunctionDelta {
                        name: None,
                        arguments: Some(arguments),
                    }),
                }
            };

            let delta = ChunkDelta {
                content: None,
                tool_calls: Some(vec![delta]),
            };
            events.extend(frame(&self.chunk(delta, None)));
        }
    }

    fn chunk(&self, delta: ChunkDelta, finish_reason: Option<FinishReason>) -> ChatCompletionChunk {
        ChatCompletionChunk::single(&self.stream_id, self.created_at, &self.model, delta, finish_reason)
    }
}

/// Frame one event as `data: <json>\n\n`
fn frame<T: Serialize>(event: &T) -> Option<Bytes> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Bytes::from(format!("{DATA_PREFIX}{json}\n\n"))),
        Err(e) => {
            tracing::warn!(error = %e, "failed to serialize stream event");
            None
        }
    }
}

/// Transcode a binding event stream into an `OpenAI` SSE body
///
/// Pull-driven: the upstream is polled only when the consumer asks for more.
/// An upstream error ends the input; the finish chunk and terminator are
/// still emitted.
pub fn transcode_stream(
    source: ByteStream,
    model: impl Into<String>,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    let transcoder = StreamTranscoder::new(model);

    stream::unfold(Some((source, transcoder)), |state| async move {
        let (mut source, mut transcoder) = state?;

        match source.next().await {
            Some(Ok(chunk)) => {
                let events = transcoder.push(&chunk);
                Some((events, Some((source, transcoder))))
            }
            Some(Err(e)) => {
                tracing::warn!(stream_id = %transcoder.stream_id(), error = %e, "upstream stream failed");
                Some((transcoder.finish(), None))
            }
            None => Some((transcoder.finish(), None)),
        }
    })
    .flat_map(|events| stream::iter(events.into_iter().map(Ok)))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::BridgeError;

    fn run(transcoder: &mut StreamTranscoder, chunks: &[&[u8]]) -> Vec<Bytes> {
        chunks.iter().flat_map(|chunk| transcoder.push(chunk)).collect()
    }

    fn transcode(chunks: &[&[u8]]) -> Vec<String> {
        let mut transcoder = StreamTranscoder::new("@cf/meta/llama");
        let mut events = run(&mut transcoder, chunks);
        events.extend(transcoder.finish());
        events
            .into_iter()
            .map(|event| String::from_utf8(event.to_vec()).unwrap())
            .collect()
    }

    fn payload(event: &str) -> Value {
        let data = event
            .strip_prefix("data: ")
            .and_then(|rest| rest.strip_suffix("\n\n"))
            .unwrap();
        serde_json::from_str(data).unwrap()
    }

    #[test]
    fn native_text_stream() {
        let events = transcode(&[b"data: {\"response\":\"Hel\"}\n\ndata: {\"response\":\"lo\"}\n\ndata: [DONE]\n\n"]);

        assert_eq!(events.len(), 4);
        let first = payload(&events[0]);
        assert_eq!(first["object"], "chat.completion.chunk");
        assert_eq!(first["model"], "@cf/meta/llama");
        assert_eq!(first["choices"][0]["delta"]["content"], "Hel");
        assert_eq!(first["choices"][0]["finish_reason"], Value::Null);
        assert_eq!(payload(&events[1])["choices"][0]["delta"]["content"], "lo");

        let finish = payload(&events[2]);
        assert_eq!(finish["choices"][0]["delta"], json!({}));
        assert_eq!(finish["choices"][0]["finish_reason"], "stop");
        assert_eq!(events[3], "data: [DONE]\n\n");
    }

    #[test]
    fn chunks_share_id_and_timestamp() {
        let events = transcode(&[b"data: {\"response\":\"a\"}\n\ndata: {\"response\":\"b\"}\n\n"]);
        let first = payload(&events[0]);
        let finish = payload(&events[2]);

        assert!(first["id"].as_str().unwrap().starts_with("workers-ai-"));
        assert_eq!(first["id"], finish["id"]);
        assert_eq!(first["created"], finish["created"]);
    }

    #[test]
    fn empty_response_is_skipped() {
        let events = transcode(&[b"data: {\"response\":\"\"}\n\n"]);
        assert_eq!(events.len(), 2);
        assert_eq!(payload(&events[0])["choices"][0]["finish_reason"], "stop");
    }

    #[test]
    fn native_tool_call_reconstruction() {
        let input = concat!(
            "data: {\"tool_calls\":[{\"id\":\"chatcmpl-tool-875d3ec6179676ae\",\"type\":\"function\",\"index\":0,\"function\":{\"name\":\"get_weather\"}}]}\n\n",
            "data: {\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{\\\"city\\\"\"}}]}\n\n",
            "data: {\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\":\\\"Paris\\\"}\"}}]}\n\n",
            "data: {\"tool_calls\":[{\"id\":null,\"type\":null,\"index\":0,\"function\":{\"name\":null,\"arguments\":\"\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        let events = transcode(&[input.as_bytes()]);
        assert_eq!(events.len(), 5);

        let start = payload(&events[0])["choices"][0]["delta"]["tool_calls"][0].clone();
        assert_eq!(
            start,
            json!({
                "index": 0,
                "id": "chatcmplt",
                "type": "function",
                "function": {"name": "get_weather", "arguments": ""}
            })
        );

        let first_args = payload(&events[1])["choices"][0]["delta"]["tool_calls"][0].clone();
        assert_eq!(first_args, json!({"index": 0, "function": {"arguments": "{\"city\""}}));
        let second_args = payload(&events[2])["choices"][0]["delta"]["tool_calls"][0].clone();
        assert_eq!(second_args["function"]["arguments"], ":\"Paris\"}");

        assert_eq!(payload(&events[3])["choices"][0]["finish_reason"], "tool_calls");
        assert_eq!(events[4], "data: [DONE]\n\n");
    }

    #[test]
    fn flat_tool_call_with_object_arguments() {
        let events = transcode(&[b"data: {\"tool_calls\":[{\"name\":\"lookup\",\"arguments\":{\"q\":\"rust\"}}]}\n\n"]);

        let call = payload(&events[0])["choices"][0]["delta"]["tool_calls"][0].clone();
        assert_eq!(call["function"]["name"], "lookup");
        assert_eq!(call["function"]["arguments"], "{\"q\":\"rust\"}");

        let id = call["id"].as_str().unwrap();
        assert!(crate::id::is_canonical(id));
    }

    #[test]
    fn synthesized_ids_differ_per_index() {
        let events = transcode(&[
            b"data: {\"tool_calls\":[{\"index\":0,\"function\":{\"name\":\"a\"}},{\"index\":1,\"function\":{\"name\":\"b\"}}]}\n\n",
        ]);

        let first = payload(&events[0])["choices"][0]["delta"]["tool_calls"][0]["id"].clone();
        let second = payload(&events[1])["choices"][0]["delta"]["tool_calls"][0]["id"].clone();
        assert_ne!(first, second);
    }

    #[test]
    fn passthrough_has_no_synthetic_finish() {
        let input = concat!(
            "data: {\"id\":\"x\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"hi\",\"reasoning_content\":\"r\"},\"finish_reason\":null}]}\n\n",
            "data: {\"id\":\"x\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
        );
        let events = transcode(&[input.as_bytes()]);

        assert_eq!(events.len(), 3);
        assert_eq!(
            payload(&events[0]),
            json!({"id":"x","choices":[{"index":0,"delta":{"content":"hi","reasoning_content":"r"},"finish_reason":null}]})
        );
        assert_eq!(payload(&events[1])["choices"][0]["finish_reason"], "stop");
        assert_eq!(events[2], "data: [DONE]\n\n");
    }

    #[test]
    fn passthrough_canonicalizes_tool_call_ids() {
        let mut transcoder = StreamTranscoder::new("m");
        let events = run(
            &mut transcoder,
            &[b"data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_abc-123-def\"}]}}]}\n\n"],
        );

        assert_eq!(
            payload(std::str::from_utf8(&events[0]).unwrap())["choices"][0]["delta"]["tool_calls"][0]["id"],
            "callabc12"
        );
        assert!(transcoder.has_tool_calls());
        assert_eq!(transcoder.format(), StreamFormat::OpenAiPassthrough);
    }

    #[test]
    fn passthrough_pins_after_native_events() {
        let input = concat!(
            "data: {\"response\":\"a\"}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"b\"},\"finish_reason\":null}]}\n\n",
        );
        let events = transcode(&[input.as_bytes()]);

        assert_eq!(events.len(), 3);
        assert_eq!(events[2], "data: [DONE]\n\n");
    }

    #[test]
    fn native_events_after_passthrough_get_no_finish() {
        let input = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"},\"finish_reason\":null}]}\n\n",
            "data: {\"response\":\"b\"}\n\n",
            "data: {\"tool_calls\":[{\"index\":0,\"function\":{\"name\":\"f\",\"arguments\":\"{}\"}}]}\n\n",
        );
        let events = transcode(&[input.as_bytes()]);

        assert_eq!(events.len(), 4);
        assert_eq!(payload(&events[0])["choices"][0]["delta"]["content"], "a");
        assert_eq!(payload(&events[1])["choices"][0]["delta"]["content"], "b");
        assert_eq!(payload(&events[2])["choices"][0]["delta"]["tool_calls"][0]["function"]["name"], "f");
        for event in &events[..3] {
            assert_eq!(payload(event)["choices"][0]["finish_reason"], Value::Null);
        }

        let done_count = events.iter().filter(|event| *event == "data: [DONE]\n\n").count();
        assert_eq!(done_count, 1);
        assert_eq!(events.last().unwrap(), "data: [DONE]\n\n");
    }

    #[test]
    fn long_line_over_many_chunks() {
        let text = "x".repeat(4096);
        let input = format!("data: {{\"response\":\"{text}\"}}\n\ndata: {{\"response\":\"y\"}}\n\n");

        let mut transcoder = StreamTranscoder::new("m");
        let mut emitted = Vec::new();
        for chunk in input.as_bytes().chunks(7) {
            emitted.push(transcoder.push(chunk).len());
        }

        assert_eq!(emitted.iter().sum::<usize>(), 2);
        assert!(transcoder.pending_line.is_empty());
    }

    #[test]
    fn malformed_events_are_skipped() {
        let events = transcode(&[b"data: {not json}\n\nevent: ping\n\n: comment\n\ndata: {\"response\":\"ok\"}\n\n"]);

        assert_eq!(events.len(), 3);
        assert_eq!(payload(&events[0])["choices"][0]["delta"]["content"], "ok");
    }

    #[test]
    fn unterminated_trailing_line_is_dropped() {
        let events = transcode(&[b"data: {\"response\":\"a\"}\n\ndata: {\"response\":\"lost\"}"]);

        assert_eq!(events.len(), 3);
        assert_eq!(payload(&events[0])["choices"][0]["delta"]["content"], "a");
    }

    #[test]
    fn done_is_emitted_once() {
        let events = transcode(&[b"data: [DONE]\n\ndata: [DONE]\n\n"]);
        let done_count = events.iter().filter(|event| *event == "data: [DONE]\n\n").count();
        assert_eq!(done_count, 1);
        assert_eq!(events.last().unwrap(), "data: [DONE]\n\n");
    }

    /// Normalize the per-stream id and timestamp so two runs compare equal
    fn strip_identity(events: Vec<String>) -> Vec<Value> {
        events
            .iter()
            .map(|event| {
                if event == "data: [DONE]\n\n" {
                    return Value::String(event.clone());
                }
                let mut value = payload(event);
                value["id"] = Value::Null;
                value["created"] = Value::Null;
                value
            })
            .collect()
    }

    #[test]
    fn chunk_boundaries_do_not_matter() {
        let input = "data: {\"response\":\"héllo wörld ✓\"}\n\ndata: {\"tool_calls\":[{\"id\":\"abc\",\"index\":0,\"function\":{\"name\":\"f\",\"arguments\":\"{}\"}}]}\n\ndata: [DONE]\n\n"
            .as_bytes();
        let whole = strip_identity(transcode(&[input]));

        for split in 1..input.len() {
            let (head, tail) = input.split_at(split);
            assert_eq!(strip_identity(transcode(&[head, tail])), whole, "split at byte {split}");
        }

        let bytewise: Vec<&[u8]> = input.chunks(1).collect();
        assert_eq!(strip_identity(transcode(&bytewise)), whole);
    }

    #[tokio::test]
    async fn stream_ends_with_finish_on_upstream_error() {
        let source: ByteStream = Box::pin(stream::iter(vec![
            Ok(Bytes::from_static(b"data: {\"response\":\"partial\"}\n\n")),
            Err(BridgeError::Streaming("connection reset".to_owned())),
            Ok(Bytes::from_static(b"data: {\"response\":\"never\"}\n\n")),
        ]));

        let events: Vec<Bytes> = transcode_stream(source, "m")
            .map(|event| match event {
                Ok(bytes) => bytes,
                Err(never) => match never {},
            })
            .collect()
            .await;

        assert_eq!(events.len(), 3);
        assert!(std::str::from_utf8(&events[0]).unwrap().contains("partial"));
        assert_eq!(events[2], Bytes::from_static(b"data: [DONE]\n\n"));
    }
}
