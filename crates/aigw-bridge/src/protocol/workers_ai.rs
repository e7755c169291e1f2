//! Workers AI native result and event shapes
//!
//! Native results look like `{"response": "...", "tool_calls": [...]}`.
//! Tool calls come either nested (`{id, function: {name, arguments}}`) or
//! flat (`{id, name, arguments}`), and `arguments` may be a string or an
//! already-parsed JSON value. Fields are read loosely from `Value` since
//! models disagree on which of these they emit.

use serde_json::Value;

/// One tool call, or one streamed slice of a tool call
#[derive(Debug, Clone, Copy)]
pub struct ToolCallFragment<'a> {
    /// Tool call slot, 0 when absent
    pub index: u32,
    /// Non-empty id, if any
    pub id: Option<&'a str>,
    /// Non-empty function name, if any
    pub name: Option<&'a str>,
    /// Arguments, string or structured, if not null
    pub arguments: Option<&'a Value>,
}

impl<'a> ToolCallFragment<'a> {
    /// Read a fragment from either the nested or the flat shape
    pub fn from_value(value: &'a Value) -> Self {
        let index = value
            .get("index")
            .and_then(Value::as_u64)
            .and_then(|index| u32::try_from(index).ok())
            .unwrap_or(0);

        Self {
            index,
            id: value.get("id").and_then(Value::as_str).filter(|id| !id.is_empty()),
            name: nested_or_flat(value, "name")
                .and_then(Value::as_str)
                .filter(|name| !name.is_empty()),
            arguments: nested_or_flat(value, "arguments"),
        }
    }

    /// Arguments as text: strings verbatim, other values as JSON
    pub fn arguments_text(&self) -> Option<String> {
        self.arguments.map(|arguments| match arguments {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
    }

    /// Whether the fragment carries no id, no name and no argument text
    ///
    /// The binding closes each tool call with such a fragment
    /// (`{id: null, function: {name: null, arguments: ""}}`).
    pub fn is_finalize_marker(&self) -> bool {
        self.id.is_none() && self.name.is_none() && self.arguments_text().is_none_or(|text| text.is_empty())
    }
}

/// `value.function.<key>`, falling back to `value.<key>`; nulls count as absent
fn nested_or_flat<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value
        .get("function")
        .and_then(|function| function.get(key))
        .filter(|field| !field.is_null())
        .or_else(|| value.get(key).filter(|field| !field.is_null()))
}
