//! Repair outgoing chat messages for the Workers AI binding
//!
//! The binding validates more strictly than the `OpenAI` API: `content`
//! must be a string and tool call ids must be canonical.

use serde_json::Value;

use crate::id::canonicalize;

/// Return normalized copies of `messages`; the input is left untouched
pub fn normalize_messages(messages: &[Value]) -> Vec<Value> {
    messages.iter().map(normalize_message).collect()
}

fn normalize_message(message: &Value) -> Value {
    let Value::Object(fields) = message else {
        return message.clone();
    };

    let mut fields = fields.clone();

    if fields.get("content").is_none_or(Value::is_null) {
        fields.insert("content".to_owned(), Value::String(String::new()));
    }

    if let Some(Value::String(id)) = fields.get_mut("tool_call_id") {
        *id = canonicalize(id);
    }

    if let Some(Value::Array(tool_calls)) = fields.get_mut("tool_calls") {
        for call in tool_calls {
            if let Some(Value::String(id)) = call.get_mut("id") {
                *id = canonicalize(id);
            }
        }
    }

    Value::Object(fields)
}
