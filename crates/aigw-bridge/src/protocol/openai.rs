//! `OpenAI` chat completion wire types emitted by the bridge

use serde::{Deserialize, Serialize};

/// Object type of a streamed chunk
pub const CHUNK_OBJECT: &str = "chat.completion.chunk";
/// Object type of a complete response
pub const COMPLETION_OBJECT: &str = "chat.completion";

/// Why generation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of the turn
    Stop,
    /// The model requested one or more tool calls
    ToolCalls,
}

impl FinishReason {
    /// `ToolCalls` when any tool call was seen, `Stop` otherwise
    pub const fn from_tool_calls(has_tool_calls: bool) -> Self {
        if has_tool_calls { Self::ToolCalls } else { Self::Stop }
    }
}

// -- Streaming types --

/// `OpenAI` streaming chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// Stream identifier, shared by every chunk of one stream
    pub id: String,
    /// Object type (always "chat.completion.chunk")
    pub object: String,
    /// Creation timestamp, shared by every chunk of one stream
    pub created: u64,
    /// Model used
    pub model: String,
    /// Delta choices
    pub choices: Vec<ChunkChoice>,
}

/// Choice within a streaming chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Choice index
    pub index: u32,
    /// Incremental delta
    pub delta: ChunkDelta,
    /// Finish reason, serialized as `null` until the final chunk
    pub finish_reason: Option<FinishReason>,
}

/// Delta content within a streaming choice
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    /// Incremental text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Incremental tool calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// Tool call slice within a streaming delta
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallDelta {
    /// Tool call slot; slices of one call share an index
    pub index: u32,
    /// Tool call ID (first slice only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Tool type (first slice only)
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub tool_type: Option<String>,
    /// Partial function call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionDelta>,
}

/// Partial function call within a tool call slice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDelta {
    /// Function name (first slice only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Arguments fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

impl ChatCompletionChunk {
    /// A chunk with a single choice at index 0
    pub fn single(id: &str, created: u64, model: &str, delta: ChunkDelta, finish_reason: Option<FinishReason>) -> Self {
        Self {
            id: id.to_owned(),
            object: CHUNK_OBJECT.to_owned(),
            created,
            model: model.to_owned(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
        }
    }
}

// -- Response types --

/// `OpenAI` chat completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletion {
    /// Response identifier
    pub id: String,
    /// Object type (always "chat.completion")
    pub object: String,
    /// Creation timestamp
    pub created: u64,
    /// Model used
    pub model: String,
    /// Generated choices
    pub choices: Vec<CompletionChoice>,
}

/// Choice within a chat completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionChoice {
    /// Choice index
    pub index: u32,
    /// Generated message
    pub message: AssistantMessage,
    /// Why generation stopped
    pub finish_reason: FinishReason,
}

/// Assistant message within a completion choice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantMessage {
    /// Role (always "assistant")
    pub role: String,
    /// Text content, empty when the model only called tools
    pub content: String,
    /// Tool calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// Complete tool call within an assistant message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Canonical tool call identifier
    pub id: String,
    /// Tool type (always "function")
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function call details
    pub function: FunctionCall,
}

/// Function call details within a tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Function name
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}
